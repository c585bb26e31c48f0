use std::time::{Duration, Instant};

use log::{debug, info, warn};
use uuid::Uuid;

use crate::BatchError;

use super::item::{ItemProcessor, ItemReader, ItemWriter};

/// Number of row errors logged in full before the step goes quiet.
pub const DEFAULT_MAX_LOGGED_ERRORS: usize = 10;

/// What the progress line calls the items written so far.
pub const DEFAULT_PROGRESS_LABEL: &str = "imported";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ChunkStatus {
    /// The chunk reached its size, more items may follow.
    Full,
    /// The reader is exhausted.
    Finished,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StepStatus {
    Starting,
    Started,
    Success,
    WriteError,
}

/// Execution details of one step run.
#[derive(Debug, Clone)]
pub struct StepExecution {
    /// Unique identifier for this step execution
    pub id: Uuid,
    /// Human-readable name for the step
    pub name: String,
    /// Current status of the step execution
    pub status: StepStatus,
    pub start_time: Instant,
    pub end_time: Instant,
    pub duration: Duration,
    /// Number of items successfully read
    pub read_count: usize,
    /// Number of items the processor skipped
    pub filter_count: usize,
    /// Number of items successfully written
    pub write_count: usize,
    /// Number of chunks successfully written
    pub chunk_count: usize,
    /// Number of errors encountered during reading
    pub read_error_count: usize,
    /// Number of errors encountered during processing
    pub process_error_count: usize,
    /// Number of items lost to failed writes
    pub write_error_count: usize,
}

impl StepExecution {
    pub fn new(name: &str) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            status: StepStatus::Starting,
            start_time: now,
            end_time: now,
            duration: Duration::ZERO,
            read_count: 0,
            filter_count: 0,
            write_count: 0,
            chunk_count: 0,
            read_error_count: 0,
            process_error_count: 0,
            write_error_count: 0,
        }
    }

    /// Errors attributable to single rows (read or process).
    pub fn row_error_count(&self) -> usize {
        self.read_error_count + self.process_error_count
    }
}

/// A step reading items one by one, processing them, and writing the
/// processed items in chunks of `chunk_size`.
///
/// Row-level failures (read or process) are counted and never stop the step.
/// A failed write stops the step: the failed chunk is not retried and no
/// further chunk is read.
pub struct ChunkOrientedStep<'a, I, O> {
    name: String,
    /// Component responsible for reading items from the source
    reader: &'a dyn ItemReader<I>,
    /// Component responsible for processing items
    processor: &'a dyn ItemProcessor<I, O>,
    /// Component responsible for writing items to the destination
    writer: &'a dyn ItemWriter<O>,
    /// Number of processed items written per chunk
    chunk_size: usize,
    /// Row errors logged with their details
    max_logged_errors: usize,
    progress_label: &'static str,
}

impl<I, O> ChunkOrientedStep<'_, I, O> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Progress line logged after each written chunk.
    pub fn progress(&self, step_execution: &StepExecution) -> String {
        format!(
            "Progress: {} {}, {} skipped, {} errors",
            step_execution.write_count,
            self.progress_label,
            step_execution.filter_count,
            step_execution.row_error_count()
        )
    }

    /// Runs the step to completion.
    ///
    /// # Returns
    /// - `Ok(())` when every chunk was written
    /// - `Err(BatchError)` with the write error that stopped the step
    pub fn execute(&self, step_execution: &mut StepExecution) -> Result<(), BatchError> {
        let start_time = Instant::now();

        info!(
            "Start of step: {}, id: {}",
            step_execution.name, step_execution.id
        );

        self.writer.open()?;
        step_execution.status = StepStatus::Started;

        let mut result = Ok(());

        loop {
            let (items, chunk_status) = self.fill_chunk(step_execution);

            if let Err(error) = self.write_chunk(step_execution, &items) {
                step_execution.status = StepStatus::WriteError;
                result = Err(error);
                break;
            }

            if chunk_status == ChunkStatus::Finished {
                step_execution.status = StepStatus::Success;
                break;
            }
        }

        if let Err(error) = self.writer.close() {
            warn!("Non-fatal error while closing writer: {}", error);
        }

        info!(
            "End of step: {}, id: {}",
            step_execution.name, step_execution.id
        );

        step_execution.start_time = start_time;
        step_execution.end_time = Instant::now();
        step_execution.duration = start_time.elapsed();

        result
    }

    /// Reads and processes items until `chunk_size` items are ready to be
    /// written or the reader is exhausted.
    fn fill_chunk(&self, step_execution: &mut StepExecution) -> (Vec<O>, ChunkStatus) {
        debug!("Start filling chunk");

        let mut items = Vec::with_capacity(self.chunk_size.min(1024));

        loop {
            let item = match self.reader.read() {
                Ok(Some(item)) => item,
                Ok(None) => {
                    debug!("End filling chunk: FINISHED");
                    return (items, ChunkStatus::Finished);
                }
                Err(error) => {
                    step_execution.read_error_count += 1;
                    self.log_row_error(step_execution, &error);
                    continue;
                }
            };
            step_execution.read_count += 1;

            match self.processor.process(&item) {
                Ok(Some(processed)) => items.push(processed),
                Ok(None) => step_execution.filter_count += 1,
                Err(error) => {
                    step_execution.process_error_count += 1;
                    self.log_row_error(step_execution, &error);
                }
            }

            if items.len() >= self.chunk_size {
                debug!("End filling chunk: FULL");
                return (items, ChunkStatus::Full);
            }
        }
    }

    fn write_chunk(
        &self,
        step_execution: &mut StepExecution,
        items: &[O],
    ) -> Result<(), BatchError> {
        if items.is_empty() {
            debug!("No items to write, skipping write call");
            return Ok(());
        }

        debug!("Writing chunk of {} items", items.len());

        match self.writer.write(items).and_then(|()| self.writer.flush()) {
            Ok(()) => {
                step_execution.write_count += items.len();
                step_execution.chunk_count += 1;
                info!("{}", self.progress(step_execution));
                Ok(())
            }
            Err(error) => {
                step_execution.write_error_count += items.len();
                log::error!(
                    "Chunk {} of step {} failed and was rolled back: {}",
                    step_execution.chunk_count + 1,
                    self.name,
                    error
                );
                Err(error)
            }
        }
    }

    fn log_row_error(&self, step_execution: &StepExecution, error: &BatchError) {
        let count = step_execution.row_error_count();
        if count <= self.max_logged_errors {
            warn!("{}", error);
        } else if count == self.max_logged_errors + 1 {
            warn!(
                "More than {} row errors, further errors are only counted",
                self.max_logged_errors
            );
        } else {
            debug!("{}", error);
        }
    }
}

pub struct ChunkOrientedStepBuilder<'a, I, O> {
    name: String,
    reader: Option<&'a dyn ItemReader<I>>,
    processor: Option<&'a dyn ItemProcessor<I, O>>,
    writer: Option<&'a dyn ItemWriter<O>>,
    chunk_size: usize,
    max_logged_errors: usize,
    progress_label: &'static str,
}

impl<'a, I, O> ChunkOrientedStepBuilder<'a, I, O> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reader: None,
            processor: None,
            writer: None,
            chunk_size: 10,
            max_logged_errors: DEFAULT_MAX_LOGGED_ERRORS,
            progress_label: DEFAULT_PROGRESS_LABEL,
        }
    }

    pub fn reader(mut self, reader: &'a dyn ItemReader<I>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn processor(mut self, processor: &'a dyn ItemProcessor<I, O>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn writer(mut self, writer: &'a dyn ItemWriter<O>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn max_logged_errors(mut self, max_logged_errors: usize) -> Self {
        self.max_logged_errors = max_logged_errors;
        self
    }

    /// Word used for written items in the progress line, `"imported"` by default.
    pub fn progress_label(mut self, progress_label: &'static str) -> Self {
        self.progress_label = progress_label;
        self
    }

    pub fn build(self) -> Result<ChunkOrientedStep<'a, I, O>, BatchError> {
        let missing = |part: &str| {
            BatchError::Configuration(format!("{} is required for building step {}", part, self.name))
        };

        if self.chunk_size == 0 {
            return Err(BatchError::Configuration(
                "Chunk size must be greater than zero".to_string(),
            ));
        }

        Ok(ChunkOrientedStep {
            reader: self.reader.ok_or_else(|| missing("Reader"))?,
            processor: self.processor.ok_or_else(|| missing("Processor"))?,
            writer: self.writer.ok_or_else(|| missing("Writer"))?,
            chunk_size: self.chunk_size,
            max_logged_errors: self.max_logged_errors,
            progress_label: self.progress_label,
            name: self.name,
        })
    }
}

pub struct StepBuilder {
    name: String,
}

impl StepBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn chunk<'a, I, O>(self, chunk_size: usize) -> ChunkOrientedStepBuilder<'a, I, O> {
        ChunkOrientedStepBuilder::new(&self.name).chunk_size(chunk_size)
    }
}
