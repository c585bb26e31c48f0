use sqlx::{query_builder::Separated, Database};

/// This module contains the PostgreSQL writer implementation.
pub mod postgres_writer;

/// Trait for binding item data to database query parameters.
///
/// One value must be pushed per configured column, in column order. Values
/// are pushed owned so they outlive the borrowed item.
///
/// # Examples
///
/// ```no_run
/// use parts_import::item::rdbc::DatabaseItemBinder;
/// use sqlx::{query_builder::Separated, Postgres};
///
/// struct Part {
///     sku: String,
///     unit_price: Option<i64>,
/// }
///
/// struct PartBinder;
/// impl DatabaseItemBinder<Part, Postgres> for PartBinder {
///     fn bind(&self, item: &Part, mut query_builder: Separated<Postgres, &str>) {
///         query_builder.push_bind(item.sku.clone());
///         query_builder.push_bind(item.unit_price);
///     }
/// }
/// ```
pub trait DatabaseItemBinder<O, DB: Database> {
    /// Binds the properties of an item to a separated query builder.
    fn bind(&self, item: &O, query_builder: Separated<DB, &str>);
}
