//! The `products` record and everything that builds, filters and stores it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Field cleaning and numeric parsing of raw cells.
pub mod clean;

/// Key-based partition of built products against the store.
pub mod dedup;

/// Builder for the name-addressed quality master export.
pub mod quality_master;

/// Builder for the position-addressed remanufactured products export.
pub mod reman;

/// Statistics over written products.
pub mod stats;

/// Store abstraction and its PostgreSQL implementation.
pub mod store;

/// Reorder point given to every imported product.
pub const DEFAULT_REORDER_POINT: i32 = 5;

/// Lifecycle status of a product. Imports only ever create active products.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Active,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
        }
    }
}

/// A row of the `products` table.
///
/// `sku` is the business key; `id` is generated when the record is built and
/// never derived from the source. Prices are integer cents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,

    pub precision_number: Option<String>,
    pub quality_number: Option<String>,

    pub driver_bellow: Option<String>,
    pub passenger_bellow: Option<String>,
    pub tie_rod_driver: Option<String>,
    pub tie_rod_passenger: Option<String>,

    pub cast_number: Option<String>,
    pub application: Option<String>,
    pub pressure_fitting: Option<String>,
    pub return_fitting: Option<String>,
    pub rack_sim_adapter: Option<String>,
    pub rack_sim_stop: Option<String>,

    pub cutter: Option<String>,
    pub bushing: Option<String>,
    pub base: Option<String>,
    pub installer: Option<String>,
    pub sleeve: Option<String>,
    pub timing: Option<String>,

    pub years: Option<String>,

    pub ups: Option<String>,
    pub lps: Option<String>,
    pub mcs: Option<String>,
    pub bhs: Option<String>,
    pub pt_x4: Option<String>,
    pub ppt: Option<String>,

    pub o_rings: Option<String>,
    pub other_parts: Option<String>,

    pub bushing_driver: Option<String>,
    pub bushing_passenger: Option<String>,
    pub bushing_insert: Option<String>,

    pub turns: Option<String>,
    pub oal: Option<String>,

    pub comments: Option<String>,
    pub oe_number: Option<String>,

    /// Shipping weight, reman exports only.
    pub weight: Option<f64>,

    pub stock_quantity: i32,
    pub reorder_point: i32,
    pub unit_cost: Option<i64>,
    pub unit_price: Option<i64>,

    pub status: ProductStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// A new active product with a fresh identifier and inventory defaults.
    pub fn new(sku: String, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            sku,
            name,
            stock_quantity: 0,
            reorder_point: DEFAULT_REORDER_POINT,
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
            ..Self::default()
        }
    }
}
