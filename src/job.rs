//! Orchestration of a whole import: read and build, optional duplicate
//! resolution, then load.

use std::{
    cell::RefCell,
    fmt,
    fs::File,
    io::Read,
    time::{Duration, Instant},
};

use log::{info, warn};
use serde::Serialize;

use crate::{
    config::ImportConfig,
    core::{
        item::{ItemProcessor, ItemWriter, ItemWriterResult},
        step::{StepBuilder, StepExecution},
    },
    error::BatchError,
    item::csv::{
        csv_reader::{CsvItemReader, CsvItemReaderBuilder},
        CsvHeaders, CsvRow,
    },
    product::{
        clean::format_cents,
        dedup::{self, DuplicateResolver, ExistingKeyCounter, LoadPlan},
        quality_master::QualityMasterProcessor,
        reman::RemanProcessor,
        stats::{ProductStats, StatsItemWriter},
        store::{ProductStore, WriteMode},
        Product,
    },
};

/// Existing SKUs listed when duplicates are reported.
const EXISTING_EXAMPLES: usize = 3;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ImportStatus {
    Completed,
    /// The duplicate policy was `abort`; nothing was written.
    Cancelled,
    /// A write was rolled back; earlier writes stay committed.
    WriteFailed(String),
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    /// Products written.
    pub imported: usize,
    /// Rows without a business key, or too short to be built.
    pub skipped: usize,
    /// Rows that could not be read or built.
    pub errors: usize,
    /// Built products whose SKU was already stored.
    pub existing: usize,
    /// Built products repeating a SKU seen earlier in the same file.
    pub repeated: usize,
    pub status: ImportStatus,
    pub stats: ProductStats,
    pub duration: Duration,
}

impl ImportSummary {
    fn new(status: ImportStatus) -> Self {
        Self {
            imported: 0,
            skipped: 0,
            errors: 0,
            existing: 0,
            repeated: 0,
            status,
            stats: ProductStats::default(),
            duration: Duration::ZERO,
        }
    }

    /// `false` when a write failed.
    pub fn is_success(&self) -> bool {
        !matches!(self.status, ImportStatus::WriteFailed(_))
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match &self.status {
            ImportStatus::Completed => "completed".to_string(),
            ImportStatus::Cancelled => "cancelled".to_string(),
            ImportStatus::WriteFailed(reason) => format!("write failed: {}", reason),
        };
        writeln!(f, "Import {} in {:.1}s", status, self.duration.as_secs_f64())?;
        writeln!(f, "Imported: {}", self.imported)?;
        writeln!(f, "Skipped: {}", self.skipped)?;
        write!(f, "Errors: {}", self.errors)?;
        if self.existing > 0 {
            write!(f, "\nAlready in database: {}", self.existing)?;
        }
        if self.repeated > 0 {
            write!(f, "\nRepeated in file: {}", self.repeated)?;
        }
        if self.stats.total > 0 {
            write!(f, "\n{}", self.stats)?;
        }
        Ok(())
    }
}

/// Gathers every built product in memory.
#[derive(Default)]
struct ProductCollector {
    products: RefCell<Vec<Product>>,
}

impl ProductCollector {
    fn into_products(self) -> Vec<Product> {
        self.products.into_inner()
    }
}

impl ItemWriter<Product> for ProductCollector {
    fn write(&self, items: &[Product]) -> ItemWriterResult {
        self.products.borrow_mut().extend_from_slice(items);
        Ok(())
    }
}

/// Runs imports for one [`ImportConfig`].
#[derive(Debug, Clone)]
pub struct ImportJob {
    config: ImportConfig,
}

impl ImportJob {
    /// # Errors
    ///
    /// `BatchError::Configuration` when the configuration is unusable.
    pub fn new(config: ImportConfig) -> Result<Self, BatchError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Streams the quality master export into `store`, upserting one batch
    /// per transaction.
    ///
    /// A failed batch stops the run with [`ImportStatus::WriteFailed`]; the
    /// batches before it stay committed.
    pub fn run_quality_master<S: ProductStore>(&self, store: &S) -> Result<ImportSummary, BatchError> {
        let start = Instant::now();
        info!("Importing quality master from {}", self.config.source.display());

        let reader = CsvItemReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.config.source)?;
        let processor = QualityMasterProcessor::from_headers(headers(&reader)?)?;

        let store_writer = store.writer(WriteMode::Upsert);
        let counter = ExistingKeyCounter::new(store_writer.as_ref(), store);
        let writer = StatsItemWriter::new(&counter);

        let step = StepBuilder::new("quality-master")
            .chunk::<CsvRow, Product>(self.config.batch_size)
            .reader(&reader)
            .processor(&processor)
            .writer(&writer)
            .max_logged_errors(self.config.max_logged_errors)
            .build()?;

        let mut execution = StepExecution::new(step.name());
        let status = match step.execute(&mut execution) {
            Ok(()) => ImportStatus::Completed,
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => ImportStatus::WriteFailed(error.to_string()),
        };

        let summary = ImportSummary {
            imported: execution.write_count,
            skipped: execution.filter_count,
            errors: execution.row_error_count(),
            existing: counter.existing(),
            stats: writer.into_stats(),
            duration: start.elapsed(),
            ..ImportSummary::new(status)
        };
        info!(
            "Quality master import finished: {} imported ({} already stored), {} skipped, {} errors",
            summary.imported, summary.existing, summary.skipped, summary.errors
        );
        Ok(summary)
    }

    /// Builds every reman product, resolves SKUs already in `store` with
    /// `resolver`, then loads the remaining set as one transaction.
    pub fn run_reman<S: ProductStore>(
        &self,
        store: &S,
        resolver: &mut dyn DuplicateResolver,
    ) -> Result<ImportSummary, BatchError> {
        let start = Instant::now();
        info!("Importing remanufactured products from {}", self.config.source.display());

        let reader = CsvItemReaderBuilder::new()
            .metadata_rows(1)
            .has_headers(true)
            .from_path(&self.config.source)?;
        let processor = RemanProcessor::from_headers(headers(&reader)?)?;

        let (products, execution) = self.build_all(&reader, &processor)?;
        let mut summary = ImportSummary {
            skipped: execution.filter_count,
            errors: execution.row_error_count(),
            ..ImportSummary::new(ImportStatus::Completed)
        };

        info!("Parsed {} products", products.len());
        if summary.skipped > 0 {
            warn!("Skipped {} rows (missing SKU or too few cells)", summary.skipped);
        }

        let Some(sample) = products.first() else {
            warn!("No products found in {}", self.config.source.display());
            summary.duration = start.elapsed();
            return Ok(summary);
        };
        log_sample(sample);

        let partition = dedup::partition(products, store)?;
        summary.existing = partition.existing.len();
        summary.repeated = partition.repeated.len();

        if summary.existing > 0 {
            let examples: Vec<&str> = partition.existing_skus().take(EXISTING_EXAMPLES).collect();
            warn!(
                "Found {} existing SKUs in database, e.g. {}",
                summary.existing,
                examples.join(", ")
            );
        }

        let (records, mode) = match partition.resolve(resolver)? {
            LoadPlan::Insert(records) => (records, WriteMode::Insert),
            LoadPlan::Overwrite(records) => (records, WriteMode::Overwrite),
            LoadPlan::Cancelled => {
                warn!("Import cancelled, nothing was written");
                summary.status = ImportStatus::Cancelled;
                summary.duration = start.elapsed();
                return Ok(summary);
            }
        };

        if records.is_empty() {
            info!("No new products to import");
            summary.duration = start.elapsed();
            return Ok(summary);
        }

        info!("Writing {} products", records.len());
        let store_writer = store.writer(mode);
        let writer = StatsItemWriter::new(store_writer.as_ref());

        match load(&writer, &records) {
            Ok(()) => {
                summary.imported = records.len();
                info!("Successfully imported {} products", records.len());
            }
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                log::error!("Import failed: {}", error);
                summary.status = ImportStatus::WriteFailed(error.to_string());
            }
        }

        summary.stats = writer.into_stats();
        summary.duration = start.elapsed();
        Ok(summary)
    }

    /// Runs every row through `processor` and keeps the built products.
    fn build_all<P>(
        &self,
        reader: &CsvItemReader<File>,
        processor: &P,
    ) -> Result<(Vec<Product>, StepExecution), BatchError>
    where
        P: ItemProcessor<CsvRow, Product>,
    {
        let collector = ProductCollector::default();

        let step = StepBuilder::new("reman-build")
            .chunk::<CsvRow, Product>(self.config.batch_size)
            .reader(reader)
            .processor(processor)
            .writer(&collector)
            .max_logged_errors(self.config.max_logged_errors)
            .progress_label("parsed")
            .build()?;

        let mut execution = StepExecution::new(step.name());
        step.execute(&mut execution)?;

        Ok((collector.into_products(), execution))
    }
}

fn headers<R: Read>(reader: &CsvItemReader<R>) -> Result<&CsvHeaders, BatchError> {
    reader
        .headers()
        .ok_or_else(|| BatchError::Configuration("CSV source has no header row".to_string()))
}

/// Writes `records` as a single unit of work.
fn load(writer: &dyn ItemWriter<Product>, records: &[Product]) -> ItemWriterResult {
    writer.open()?;
    let result = writer.write(records).and_then(|()| writer.flush());
    if let Err(error) = writer.close() {
        warn!("Non-fatal error while closing writer: {}", error);
    }
    result
}

/// Profit over price, in percent.
fn margin_percent(price: i64, cost: i64) -> Option<f64> {
    if price == 0 {
        return None;
    }
    Some((price - cost) as f64 / price as f64 * 100.0)
}

fn log_sample(sample: &Product) {
    info!("Sample product:");
    info!("  SKU: {}", sample.sku);
    info!("  Name: {}", sample.name);
    info!("  Category: {}", sample.category.as_deref().unwrap_or("-"));
    info!("  Application: {}", sample.application.as_deref().unwrap_or("-"));

    let price = sample.unit_price.filter(|price| *price != 0);
    let cost = sample.unit_cost.filter(|cost| *cost != 0);
    if let Some(price) = price {
        info!("  Price: {}", format_cents(price));
    }
    if let Some(cost) = cost {
        info!("  Cost: {}", format_cents(cost));
        if let Some(margin) = price.and_then(|price| margin_percent(price, cost)) {
            info!("  Margin: {:.1}%", margin);
        }
    }
}
