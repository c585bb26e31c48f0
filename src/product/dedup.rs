use std::{cell::Cell, collections::HashSet};

use clap::ValueEnum;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    core::item::{ItemWriter, ItemWriterResult},
    error::BatchError,
};

use super::Product;

/// Repeated keys listed in the warning before the list is cut short.
const MAX_LISTED_KEYS: usize = 10;

/// Lookup of business keys already present in the store.
pub trait ExistingKeys {
    /// Returns the subset of `skus` that already exist.
    fn existing_keys(&self, skus: &[String]) -> Result<HashSet<String>, BatchError>;
}

/// Built products split by whether their key is already stored.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Partition {
    /// Keys unknown to the store.
    pub new: Vec<Product>,
    /// Keys the store already holds.
    pub existing: Vec<Product>,
    /// Later occurrences of a key already seen in the same source. Never loaded.
    pub repeated: Vec<Product>,
}

impl Partition {
    pub fn existing_skus(&self) -> impl Iterator<Item = &str> {
        self.existing.iter().map(|product| product.sku.as_str())
    }

    /// Applies the resolver's decision and returns what is left to load.
    ///
    /// The resolver is only consulted when existing keys were found.
    pub fn resolve(self, resolver: &mut dyn DuplicateResolver) -> Result<LoadPlan, BatchError> {
        if self.existing.is_empty() {
            return Ok(LoadPlan::Insert(self.new));
        }

        let report = DuplicateReport {
            existing: &self.existing,
            new_count: self.new.len(),
            repeated_count: self.repeated.len(),
        };

        let policy = resolver.resolve(&report)?;
        info!("Duplicate policy: {}", policy);

        Ok(match policy {
            DuplicatePolicy::Skip => LoadPlan::Insert(self.new),
            DuplicatePolicy::Overwrite => {
                let mut records = self.new;
                records.extend(self.existing);
                LoadPlan::Overwrite(records)
            }
            DuplicatePolicy::Abort => LoadPlan::Cancelled,
        })
    }
}

/// Splits `records` on a single key lookup.
///
/// Only the first occurrence of a key inside `records` takes part in the
/// lookup; later ones end up in [`Partition::repeated`].
pub fn partition(records: Vec<Product>, keys: &dyn ExistingKeys) -> Result<Partition, BatchError> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut unique = Vec::with_capacity(records.len());
    let mut repeated = Vec::new();

    for record in records {
        if seen.insert(record.sku.clone()) {
            unique.push(record);
        } else {
            repeated.push(record);
        }
    }

    if !repeated.is_empty() {
        let listed: Vec<&str> = repeated
            .iter()
            .take(MAX_LISTED_KEYS)
            .map(|product| product.sku.as_str())
            .collect();
        warn!(
            "{} record(s) repeat a SKU already seen in this file and will not be loaded: {}{}",
            repeated.len(),
            listed.join(", "),
            if repeated.len() > MAX_LISTED_KEYS { ", ..." } else { "" }
        );
    }

    if unique.is_empty() {
        return Ok(Partition {
            repeated,
            ..Partition::default()
        });
    }

    let skus: Vec<String> = unique.iter().map(|product| product.sku.clone()).collect();
    let found = keys.existing_keys(&skus)?;

    let (existing, new): (Vec<Product>, Vec<Product>) = unique
        .into_iter()
        .partition(|product| found.contains(&product.sku));

    info!(
        "{} new product(s), {} already in the database",
        new.len(),
        existing.len()
    );

    Ok(Partition {
        new,
        existing,
        repeated,
    })
}

/// What to do with products whose key is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Load only the new products.
    Skip,
    /// Load everything, replacing the stored descriptive and commercial fields.
    Overwrite,
    /// Load nothing.
    Abort,
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Skip => "skip",
            Self::Overwrite => "overwrite",
            Self::Abort => "abort",
        };
        f.write_str(name)
    }
}

/// Facts handed to a [`DuplicateResolver`].
#[derive(Debug)]
pub struct DuplicateReport<'a> {
    pub existing: &'a [Product],
    pub new_count: usize,
    pub repeated_count: usize,
}

impl DuplicateReport<'_> {
    pub fn existing_skus(&self) -> impl Iterator<Item = &str> {
        self.existing.iter().map(|product| product.sku.as_str())
    }
}

/// Decides the [`DuplicatePolicy`] once existing keys are known.
pub trait DuplicateResolver {
    fn resolve(&mut self, report: &DuplicateReport<'_>) -> Result<DuplicatePolicy, BatchError>;
}

impl DuplicateResolver for DuplicatePolicy {
    fn resolve(&mut self, _report: &DuplicateReport<'_>) -> Result<DuplicatePolicy, BatchError> {
        Ok(*self)
    }
}

impl<F> DuplicateResolver for F
where
    F: FnMut(&DuplicateReport<'_>) -> Result<DuplicatePolicy, BatchError>,
{
    fn resolve(&mut self, report: &DuplicateReport<'_>) -> Result<DuplicatePolicy, BatchError> {
        self(report)
    }
}

/// Products left to load after duplicate resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadPlan {
    /// Plain insert of products whose keys are all new.
    Insert(Vec<Product>),
    /// Upsert of new and existing products.
    Overwrite(Vec<Product>),
    /// Nothing is loaded.
    Cancelled,
}

impl LoadPlan {
    pub fn records(&self) -> &[Product] {
        match self {
            Self::Insert(records) | Self::Overwrite(records) => records,
            Self::Cancelled => &[],
        }
    }
}

/// Wraps a product writer and counts the distinct SKUs of each chunk that
/// were already stored before the chunk was written.
///
/// Only chunks the delegate writes successfully are counted.
pub struct ExistingKeyCounter<'a> {
    delegate: &'a dyn ItemWriter<Product>,
    keys: &'a dyn ExistingKeys,
    existing: Cell<usize>,
}

impl<'a> ExistingKeyCounter<'a> {
    pub fn new(delegate: &'a dyn ItemWriter<Product>, keys: &'a dyn ExistingKeys) -> Self {
        Self {
            delegate,
            keys,
            existing: Cell::new(0),
        }
    }

    pub fn existing(&self) -> usize {
        self.existing.get()
    }
}

impl ItemWriter<Product> for ExistingKeyCounter<'_> {
    fn write(&self, items: &[Product]) -> ItemWriterResult {
        let mut seen = HashSet::with_capacity(items.len());
        let skus: Vec<String> = items
            .iter()
            .filter(|product| seen.insert(product.sku.as_str()))
            .map(|product| product.sku.clone())
            .collect();
        let found = self.keys.existing_keys(&skus)?;

        self.delegate.write(items)?;

        debug!("{} of {} SKUs in chunk were already stored", found.len(), skus.len());
        self.existing.set(self.existing.get() + found.len());
        Ok(())
    }

    fn flush(&self) -> ItemWriterResult {
        self.delegate.flush()
    }

    fn open(&self) -> ItemWriterResult {
        self.delegate.open()
    }

    fn close(&self) -> ItemWriterResult {
        self.delegate.close()
    }
}
