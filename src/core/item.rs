use crate::error::BatchError;

/// Represents the result of reading an item from the reader.
///
/// - `Ok(Some(item))`: an item was read
/// - `Ok(None)`: the source is exhausted
/// - `Err(error)`: the current item could not be read; the reader stays usable
pub type ItemReaderResult<I> = Result<Option<I>, BatchError>;

/// Represents the result of processing an item.
///
/// `Ok(None)` means the item was filtered out (skipped) and must not be written.
pub type ItemProcessorResult<O> = Result<Option<O>, BatchError>;

/// Represents the result of writing a chunk of items.
pub type ItemWriterResult = Result<(), BatchError>;

/// A trait for reading items, one at a time.
pub trait ItemReader<I> {
    /// Reads the next item.
    fn read(&self) -> ItemReaderResult<I>;
}

/// A trait for turning a read item into an output item.
pub trait ItemProcessor<I, O> {
    /// Processes one item.
    ///
    /// # Returns
    /// - `Ok(Some(item))` when the item should be written
    /// - `Ok(None)` when the item is skipped
    /// - `Err(BatchError)` when the item could not be processed
    fn process(&self, item: &I) -> ItemProcessorResult<O>;
}

/// A trait for writing items, one chunk at a time.
///
/// A call to `write` is a unit of work: either every item of the chunk is
/// persisted or none is.
pub trait ItemWriter<O> {
    /// Writes a chunk of items.
    fn write(&self, items: &[O]) -> ItemWriterResult;

    /// Flushes any buffered data.
    fn flush(&self) -> ItemWriterResult {
        Ok(())
    }

    /// Opens the writer before the first chunk.
    fn open(&self) -> ItemWriterResult {
        Ok(())
    }

    /// Closes the writer after the last chunk.
    fn close(&self) -> ItemWriterResult {
        Ok(())
    }
}
