use std::collections::{HashMap, HashSet};

use log::{debug, info};
use sqlx::{postgres::PgPoolOptions, query_builder::Separated, PgPool, Postgres};

use crate::{
    core::item::{ItemWriter, ItemWriterResult},
    error::BatchError,
    item::{
        logger::LoggerWriter,
        rdbc::{
            postgres_writer::{OnConflict, PostgresItemWriter},
            DatabaseItemBinder,
        },
    },
};

use super::{dedup::ExistingKeys, Product};

pub const PRODUCTS_TABLE: &str = "products";

/// Columns written for a quality master product, in binding order.
pub const QUALITY_MASTER_COLUMNS: [&str; 46] = [
    "id",
    "sku",
    "name",
    "description",
    "category",
    "precision_number",
    "quality_number",
    "driver_bellow",
    "passenger_bellow",
    "tie_rod_driver",
    "tie_rod_passenger",
    "cast_number",
    "application",
    "pressure_fitting",
    "return_fitting",
    "rack_sim_adapter",
    "rack_sim_stop",
    "cutter",
    "bushing",
    "base",
    "installer",
    "sleeve",
    "timing",
    "years",
    "ups",
    "lps",
    "mcs",
    "bhs",
    "pt_x4",
    "ppt",
    "o_rings",
    "other_parts",
    "bushing_driver",
    "bushing_passenger",
    "bushing_insert",
    "turns",
    "oal",
    "comments",
    "oe_number",
    "stock_quantity",
    "reorder_point",
    "unit_cost",
    "unit_price",
    "status",
    "created_at",
    "updated_at",
];

/// Columns a quality master upsert refreshes on an existing SKU.
pub const QUALITY_MASTER_UPDATES: [&str; 3] = ["name", "application", "updated_at"];

/// Columns written for a reman product, in binding order.
pub const REMAN_COLUMNS: [&str; 17] = [
    "id",
    "sku",
    "name",
    "description",
    "category",
    "application",
    "years",
    "oe_number",
    "comments",
    "weight",
    "unit_price",
    "unit_cost",
    "stock_quantity",
    "reorder_point",
    "status",
    "created_at",
    "updated_at",
];

/// Columns an overwrite refreshes on an existing SKU. Identity, inventory,
/// status and creation time are kept.
pub const REMAN_UPDATES: [&str; 11] = [
    "name",
    "description",
    "category",
    "application",
    "years",
    "oe_number",
    "comments",
    "weight",
    "unit_price",
    "unit_cost",
    "updated_at",
];

/// How a writer treats SKUs that already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Quality master shape; existing SKUs get a new name and application.
    Upsert,
    /// Reman shape; an existing SKU fails the write.
    Insert,
    /// Reman shape; existing SKUs get every descriptive and commercial field.
    Overwrite,
}

impl WriteMode {
    /// `true` when an existing SKU is updated rather than rejected.
    pub fn updates_existing(&self) -> bool {
        matches!(self, Self::Upsert | Self::Overwrite)
    }
}

/// Target of an import: key lookup plus chunk writers.
pub trait ProductStore: ExistingKeys {
    /// A writer committing each chunk as one transaction.
    fn writer(&self, mode: WriteMode) -> Box<dyn ItemWriter<Product> + '_>;
}

struct QualityMasterBinder;

impl DatabaseItemBinder<Product, Postgres> for QualityMasterBinder {
    fn bind(&self, item: &Product, mut query_builder: Separated<Postgres, &str>) {
        query_builder.push_bind(item.id.clone());
        query_builder.push_bind(item.sku.clone());
        query_builder.push_bind(item.name.clone());
        query_builder.push_bind(item.description.clone());
        query_builder.push_bind(item.category.clone());
        query_builder.push_bind(item.precision_number.clone());
        query_builder.push_bind(item.quality_number.clone());
        query_builder.push_bind(item.driver_bellow.clone());
        query_builder.push_bind(item.passenger_bellow.clone());
        query_builder.push_bind(item.tie_rod_driver.clone());
        query_builder.push_bind(item.tie_rod_passenger.clone());
        query_builder.push_bind(item.cast_number.clone());
        query_builder.push_bind(item.application.clone());
        query_builder.push_bind(item.pressure_fitting.clone());
        query_builder.push_bind(item.return_fitting.clone());
        query_builder.push_bind(item.rack_sim_adapter.clone());
        query_builder.push_bind(item.rack_sim_stop.clone());
        query_builder.push_bind(item.cutter.clone());
        query_builder.push_bind(item.bushing.clone());
        query_builder.push_bind(item.base.clone());
        query_builder.push_bind(item.installer.clone());
        query_builder.push_bind(item.sleeve.clone());
        query_builder.push_bind(item.timing.clone());
        query_builder.push_bind(item.years.clone());
        query_builder.push_bind(item.ups.clone());
        query_builder.push_bind(item.lps.clone());
        query_builder.push_bind(item.mcs.clone());
        query_builder.push_bind(item.bhs.clone());
        query_builder.push_bind(item.pt_x4.clone());
        query_builder.push_bind(item.ppt.clone());
        query_builder.push_bind(item.o_rings.clone());
        query_builder.push_bind(item.other_parts.clone());
        query_builder.push_bind(item.bushing_driver.clone());
        query_builder.push_bind(item.bushing_passenger.clone());
        query_builder.push_bind(item.bushing_insert.clone());
        query_builder.push_bind(item.turns.clone());
        query_builder.push_bind(item.oal.clone());
        query_builder.push_bind(item.comments.clone());
        query_builder.push_bind(item.oe_number.clone());
        query_builder.push_bind(item.stock_quantity);
        query_builder.push_bind(item.reorder_point);
        query_builder.push_bind(item.unit_cost);
        query_builder.push_bind(item.unit_price);
        query_builder.push_bind(item.status.as_str());
        query_builder.push_bind(item.created_at);
        query_builder.push_bind(item.updated_at);
    }
}

struct RemanBinder;

impl DatabaseItemBinder<Product, Postgres> for RemanBinder {
    fn bind(&self, item: &Product, mut query_builder: Separated<Postgres, &str>) {
        query_builder.push_bind(item.id.clone());
        query_builder.push_bind(item.sku.clone());
        query_builder.push_bind(item.name.clone());
        query_builder.push_bind(item.description.clone());
        query_builder.push_bind(item.category.clone());
        query_builder.push_bind(item.application.clone());
        query_builder.push_bind(item.years.clone());
        query_builder.push_bind(item.oe_number.clone());
        query_builder.push_bind(item.comments.clone());
        query_builder.push_bind(item.weight);
        query_builder.push_bind(item.unit_price);
        query_builder.push_bind(item.unit_cost);
        query_builder.push_bind(item.stock_quantity);
        query_builder.push_bind(item.reorder_point);
        query_builder.push_bind(item.status.as_str());
        query_builder.push_bind(item.created_at);
        query_builder.push_bind(item.updated_at);
    }
}

/// [`ProductStore`] over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a single-connection pool on `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, BatchError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .map_err(|error| BatchError::Connection(error.to_string()))?;
        info!("Connected to database");
        Ok(Self::new(pool))
    }

    /// Applies the migrations under `migrations/`.
    pub async fn migrate(&self) -> Result<(), BatchError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|error| BatchError::Configuration(format!("Migration failed: {}", error)))?;
        info!("Database schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
        debug!("Database pool closed");
    }
}

fn lookup_error(error: sqlx::Error) -> BatchError {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Protocol(_) => BatchError::Connection(error.to_string()),
        _ => BatchError::ItemReader(format!("Existing key lookup failed: {}", error)),
    }
}

impl ExistingKeys for PgProductStore {
    fn existing_keys(&self, skus: &[String]) -> Result<HashSet<String>, BatchError> {
        if skus.is_empty() {
            return Ok(HashSet::new());
        }

        let query = sqlx::query_scalar::<_, String>("SELECT sku FROM products WHERE sku = ANY($1)")
            .bind(skus.to_vec());

        let found = tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async { query.fetch_all(&self.pool).await })
        })
        .map_err(lookup_error)?;

        debug!("{} of {} SKUs already present", found.len(), skus.len());
        Ok(found.into_iter().collect())
    }
}

impl ProductStore for PgProductStore {
    fn writer(&self, mode: WriteMode) -> Box<dyn ItemWriter<Product> + '_> {
        let writer = PostgresItemWriter::new()
            .pool(&self.pool)
            .table(PRODUCTS_TABLE);

        let writer = match mode {
            WriteMode::Upsert => writer
                .add_columns(&QUALITY_MASTER_COLUMNS)
                .item_binder(&QualityMasterBinder)
                .on_conflict(OnConflict::DoUpdate {
                    target: "sku",
                    update_columns: QUALITY_MASTER_UPDATES.to_vec(),
                }),
            WriteMode::Insert => writer
                .add_columns(&REMAN_COLUMNS)
                .item_binder(&RemanBinder),
            WriteMode::Overwrite => writer
                .add_columns(&REMAN_COLUMNS)
                .item_binder(&RemanBinder)
                .on_conflict(OnConflict::DoUpdate {
                    target: "sku",
                    update_columns: REMAN_UPDATES.to_vec(),
                }),
        };

        Box::new(MergeRepeats {
            delegate: writer,
            mode,
        })
    }
}

/// Writes each SKU of a chunk once before delegating.
///
/// PostgreSQL rejects an `ON CONFLICT DO UPDATE` statement that touches the
/// same row twice, which a chunk with a repeated SKU would do.
struct MergeRepeats<W> {
    delegate: W,
    mode: WriteMode,
}

impl<W: ItemWriter<Product>> ItemWriter<Product> for MergeRepeats<W> {
    fn write(&self, items: &[Product]) -> ItemWriterResult {
        if !self.mode.updates_existing() {
            return self.delegate.write(items);
        }

        let merged = merge_repeats(items, self.mode);
        if merged.len() == items.len() {
            return self.delegate.write(items);
        }

        debug!(
            "{} repeated SKU(s) in chunk merged into their first occurrence",
            items.len() - merged.len()
        );
        self.delegate.write(&merged)
    }
}

/// One product per SKU, in first-occurrence order.
///
/// The first occurrence is kept whole; a later one only refreshes the columns
/// `mode` updates on conflict, as consecutive single-row upserts would.
fn merge_repeats(items: &[Product], mode: WriteMode) -> Vec<Product> {
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(items.len());
    let mut merged: Vec<Product> = Vec::with_capacity(items.len());

    for product in items {
        match positions.get(product.sku.as_str()) {
            Some(&index) => refresh(&mut merged[index], product, mode),
            None => {
                positions.insert(product.sku.as_str(), merged.len());
                merged.push(product.clone());
            }
        }
    }
    merged
}

/// Copies the update columns of `mode` from `update` onto `stored`.
fn refresh(stored: &mut Product, update: &Product, mode: WriteMode) {
    match mode {
        WriteMode::Upsert => {
            stored.name = update.name.clone();
            stored.application = update.application.clone();
            stored.updated_at = update.updated_at;
        }
        WriteMode::Overwrite => {
            stored.name = update.name.clone();
            stored.description = update.description.clone();
            stored.category = update.category.clone();
            stored.application = update.application.clone();
            stored.years = update.years.clone();
            stored.oe_number = update.oe_number.clone();
            stored.comments = update.comments.clone();
            stored.weight = update.weight;
            stored.unit_price = update.unit_price;
            stored.unit_cost = update.unit_cost;
            stored.updated_at = update.updated_at;
        }
        WriteMode::Insert => {}
    }
}

/// [`ProductStore`] that knows no keys and logs every record instead of
/// writing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunStore;

impl ExistingKeys for DryRunStore {
    fn existing_keys(&self, _skus: &[String]) -> Result<HashSet<String>, BatchError> {
        Ok(HashSet::new())
    }
}

impl ProductStore for DryRunStore {
    fn writer(&self, mode: WriteMode) -> Box<dyn ItemWriter<Product> + '_> {
        info!("Dry run: {:?} writes are logged, nothing is stored", mode);
        Box::new(LoggerWriter::new("dry-run"))
    }
}
