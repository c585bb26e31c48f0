#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashSet},
    io::Write,
};

use chrono::Utc;
use parts_import::{
    core::item::{ItemWriter, ItemWriterResult},
    product::{
        dedup::ExistingKeys,
        store::{ProductStore, WriteMode},
        Product,
    },
    BatchError,
};
use tempfile::NamedTempFile;

/// A [`ProductStore`] keeping rows in memory, keyed by SKU, with the same
/// per-write transaction semantics as the PostgreSQL store.
#[derive(Default)]
pub struct InMemoryProductStore {
    rows: RefCell<BTreeMap<String, Product>>,
    /// 1-based write call that fails and is rolled back.
    fail_on_write: Option<usize>,
    write_calls: Cell<usize>,
    lookups: Cell<usize>,
    committed_chunks: RefCell<Vec<usize>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on_write(write_call: usize) -> Self {
        Self {
            fail_on_write: Some(write_call),
            ..Self::default()
        }
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        let store = Self::default();
        store.rows.borrow_mut().extend(
            products
                .into_iter()
                .map(|product| (product.sku.clone(), product)),
        );
        store
    }

    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    pub fn get(&self, sku: &str) -> Option<Product> {
        self.rows.borrow().get(sku).cloned()
    }

    pub fn skus(&self) -> Vec<String> {
        self.rows.borrow().keys().cloned().collect()
    }

    /// Sizes of the writes that were committed, in order.
    pub fn committed_chunks(&self) -> Vec<usize> {
        self.committed_chunks.borrow().clone()
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.get()
    }

    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }
}

impl ExistingKeys for InMemoryProductStore {
    fn existing_keys(&self, skus: &[String]) -> Result<HashSet<String>, BatchError> {
        self.lookups.set(self.lookups.get() + 1);
        let rows = self.rows.borrow();
        Ok(skus
            .iter()
            .filter(|sku| rows.contains_key(sku.as_str()))
            .cloned()
            .collect())
    }
}

impl ProductStore for InMemoryProductStore {
    fn writer(&self, mode: WriteMode) -> Box<dyn ItemWriter<Product> + '_> {
        Box::new(InMemoryWriter { store: self, mode })
    }
}

struct InMemoryWriter<'a> {
    store: &'a InMemoryProductStore,
    mode: WriteMode,
}

impl ItemWriter<Product> for InMemoryWriter<'_> {
    fn write(&self, items: &[Product]) -> ItemWriterResult {
        let call = self.store.write_calls.get() + 1;
        self.store.write_calls.set(call);

        if self.store.fail_on_write == Some(call) {
            return Err(BatchError::ItemWriter(format!(
                "simulated failure on write {}",
                call
            )));
        }

        let mut staged = self.store.rows.borrow().clone();

        for item in items {
            match (staged.get_mut(&item.sku), self.mode) {
                (None, _) => {
                    staged.insert(item.sku.clone(), item.clone());
                }
                (Some(_), WriteMode::Insert) => {
                    return Err(BatchError::DuplicateKey(format!(
                        "products_sku_key: Key (sku)=({}) already exists",
                        item.sku
                    )));
                }
                (Some(row), WriteMode::Upsert) => {
                    row.name = item.name.clone();
                    row.application = item.application.clone();
                    row.updated_at = Utc::now();
                }
                (Some(row), WriteMode::Overwrite) => {
                    row.name = item.name.clone();
                    row.description = item.description.clone();
                    row.category = item.category.clone();
                    row.application = item.application.clone();
                    row.years = item.years.clone();
                    row.oe_number = item.oe_number.clone();
                    row.comments = item.comments.clone();
                    row.weight = item.weight;
                    row.unit_price = item.unit_price;
                    row.unit_cost = item.unit_cost;
                    row.updated_at = Utc::now();
                }
            }
        }

        *self.store.rows.borrow_mut() = staged;
        self.store.committed_chunks.borrow_mut().push(items.len());
        Ok(())
    }
}

/// Writes `content` to a temporary `.csv` file.
pub fn csv_file(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("temporary file");
    file.write_all(content.as_bytes()).expect("write csv");
    file.flush().expect("flush csv");
    file
}

pub const QUALITY_MASTER_HEADER: &str =
    "Quality #,Precision #,Application,Years,Timing,Comments,OE number";

/// A quality master export with one row per `(quality, precision, application)`.
pub fn quality_master_csv(rows: &[(&str, &str, &str)]) -> String {
    let mut content = format!("{}\n", QUALITY_MASTER_HEADER);
    for (quality, precision, application) in rows {
        content.push_str(&format!(
            "{},{},\"{}\",1998-2003,12 o'clock,,\n",
            quality, precision, application
        ));
    }
    content
}

pub const REMAN_HEADER: &str = "ID,SKU,NAME,PART NUMBER,PRODUCT CATEGORY,TYPE,YEAR,PRIMARY OEM,\
MANUFACTURER,MAKE,ENGINE,ENGINE,CONDITION,REMAN,PRICE,VENDOR COST,ACTUAL COST,WEIGHT,CORE,CORE PRICE";

/// One reman row in the layout of [`REMAN_HEADER`].
pub struct RemanRow<'a> {
    pub sku: &'a str,
    pub name: &'a str,
    pub price: &'a str,
    pub cost: &'a str,
}

impl<'a> RemanRow<'a> {
    pub fn new(sku: &'a str, name: &'a str) -> Self {
        Self {
            sku,
            name,
            price: "$1,800.00",
            cost: "$900.00",
        }
    }

    pub fn priced(mut self, price: &'a str, cost: &'a str) -> Self {
        self.price = price;
        self.cost = cost;
        self
    }

    fn to_line(&self, id: usize) -> String {
        format!(
            "{},{},{},PN-{},Injectors,Injector,2003-2007,OEM-{},Navistar,Ford,6.0L,6.0L,Reman,YES,\"{}\",$700.00,\"{}\",4.5,YES,$250.00",
            id, self.sku, self.name, id, self.sku, self.price, self.cost
        )
    }
}

/// A reman export: a metadata row, the header row, then `rows`.
pub fn reman_csv(rows: &[RemanRow<'_>]) -> String {
    let mut content = String::from("Exported from parts database,2024-01-05\n");
    content.push_str(REMAN_HEADER);
    content.push('\n');
    for (index, row) in rows.iter().enumerate() {
        content.push_str(&row.to_line(index + 1));
        content.push('\n');
    }
    content
}

/// A stored product as an earlier import would have left it.
pub fn stored_product(sku: &str, name: &str) -> Product {
    Product {
        stock_quantity: 7,
        category: Some("Injectors".to_string()),
        ..Product::new(sku.to_string(), name.to_string())
    }
}
