use std::{cell::RefCell, collections::HashMap};

use serde::Serialize;

use crate::core::item::{ItemWriter, ItemWriterResult};

use super::{clean::format_cents, Product};

/// Category reported for products without one.
const UNKNOWN_CATEGORY: &str = "Unknown";

/// Aggregates over the products actually written.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ProductStats {
    pub total: usize,
    /// Products with a non-zero price.
    pub with_price: usize,
    /// Products with a non-zero cost.
    pub with_cost: usize,
    price_sum: i64,
    categories: HashMap<String, usize>,
}

impl ProductStats {
    pub fn record(&mut self, product: &Product) {
        self.total += 1;
        if product.unit_price.is_some_and(|price| price != 0) {
            self.with_price += 1;
        }
        if product.unit_cost.is_some_and(|cost| cost != 0) {
            self.with_cost += 1;
        }
        self.price_sum += product.unit_price.unwrap_or(0);

        let category = product
            .category
            .clone()
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
        *self.categories.entry(category).or_insert(0) += 1;
    }

    /// Average price in cents over every product, unpriced ones counting as zero.
    pub fn average_price(&self) -> Option<i64> {
        if self.total == 0 {
            None
        } else {
            Some(self.price_sum / self.total as i64)
        }
    }

    /// The `limit` largest categories, largest first, ties by name.
    pub fn top_categories(&self, limit: usize) -> Vec<(&str, usize)> {
        let mut categories: Vec<(&str, usize)> = self
            .categories
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        categories.truncate(limit);
        categories
    }
}

impl std::fmt::Display for ProductStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total products imported: {}", self.total)?;
        writeln!(f, "Products with pricing: {}", self.with_price)?;
        writeln!(f, "Products with cost data: {}", self.with_cost)?;
        write!(
            f,
            "Average price: {}",
            format_cents(self.average_price().unwrap_or(0))
        )?;
        for (category, count) in self.top_categories(5) {
            write!(f, "\n  {}: {}", category, count)?;
        }
        Ok(())
    }
}

/// Wraps a product writer and records statistics for every chunk it
/// writes successfully.
pub struct StatsItemWriter<'a> {
    delegate: &'a dyn ItemWriter<Product>,
    stats: RefCell<ProductStats>,
}

impl<'a> StatsItemWriter<'a> {
    pub fn new(delegate: &'a dyn ItemWriter<Product>) -> Self {
        Self {
            delegate,
            stats: RefCell::new(ProductStats::default()),
        }
    }

    pub fn stats(&self) -> ProductStats {
        self.stats.borrow().clone()
    }

    pub fn into_stats(self) -> ProductStats {
        self.stats.into_inner()
    }
}

impl ItemWriter<Product> for StatsItemWriter<'_> {
    fn write(&self, items: &[Product]) -> ItemWriterResult {
        self.delegate.write(items)?;

        let mut stats = self.stats.borrow_mut();
        items.iter().for_each(|product| stats.record(product));
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
