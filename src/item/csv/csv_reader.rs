use csv::{ByteRecord, ReaderBuilder, Terminator, Trim};
use std::{
    cell::{Cell, RefCell},
    fs::File,
    io::Read,
    path::Path,
};

use crate::{
    core::item::{ItemReader, ItemReaderResult},
    error::BatchError,
};

use super::{CsvHeaders, CsvRow};

/// A CSV item reader that implements the `ItemReader` trait.
///
/// Rows are returned as raw [`CsvRow`]s: cells are decoded lossily (invalid
/// UTF-8 sequences become U+FFFD) and rows may have any number of cells.
/// Mapping cells to fields is left to the processor.
///
/// # Examples
///
/// ```
/// use parts_import::item::csv::csv_reader::CsvItemReaderBuilder;
/// use parts_import::core::item::ItemReader;
///
/// let data = "\
/// exported 2024-01-05
/// SKU,NAME
/// TX-1,Injector
/// ";
///
/// let reader = CsvItemReaderBuilder::new()
///     .metadata_rows(1)
///     .has_headers(true)
///     .from_reader(data.as_bytes())
///     .unwrap();
///
/// assert_eq!(reader.headers().unwrap().position("name"), Some(1));
///
/// let row = reader.read().unwrap().unwrap();
/// assert_eq!(row.get(0), Some("TX-1"));
/// assert_eq!(row.line(), 3);
/// assert!(reader.read().unwrap().is_none());
/// ```
pub struct CsvItemReader<R> {
    /// Uses `RefCell` so rows can be pulled through the `&self` signature of
    /// the `ItemReader` trait.
    reader: RefCell<csv::Reader<R>>,
    record: RefCell<ByteRecord>,
    headers: Option<CsvHeaders>,
    /// Set after an I/O failure, the underlying stream cannot be resumed.
    exhausted: Cell<bool>,
}

impl<R: Read> CsvItemReader<R> {
    /// Header row captured when the reader was built with `has_headers(true)`.
    pub fn headers(&self) -> Option<&CsvHeaders> {
        self.headers.as_ref()
    }

    fn next_record(&self) -> Result<Option<CsvRow>, csv::Error> {
        let mut record = self.record.borrow_mut();
        if !self.reader.borrow_mut().read_byte_record(&mut record)? {
            return Ok(None);
        }

        let line = record.position().map(|position| position.line()).unwrap_or(0);
        let cells = record
            .iter()
            .map(|cell| String::from_utf8_lossy(cell).into_owned())
            .collect();

        Ok(Some(CsvRow::new(line, cells)))
    }
}

impl<R: Read> ItemReader<CsvRow> for CsvItemReader<R> {
    /// Reads the next row from the CSV source.
    ///
    /// # Returns
    /// - `Ok(Some(row))` if a row is successfully read
    /// - `Ok(None)` if there are no more rows to read
    /// - `Err(BatchError::ItemReader(error))` if the current record is malformed
    fn read(&self) -> ItemReaderResult<CsvRow> {
        if self.exhausted.get() {
            return Ok(None);
        }

        match self.next_record() {
            Ok(row) => Ok(row),
            Err(error) => {
                if error.is_io_error() {
                    self.exhausted.set(true);
                }
                Err(BatchError::ItemReader(error.to_string()))
            }
        }
    }
}

/// A builder for configuring CSV item reading.
///
/// # Default Configuration
///
/// - Delimiter: comma (,)
/// - Terminator: CRLF (accepts `\r\n`, `\n` and `\r`)
/// - Metadata rows: none
/// - Headers: disabled
/// - Trimming: All fields trimmed
#[derive(Debug, Clone)]
pub struct CsvItemReaderBuilder {
    /// The delimiter character (default: comma ',')
    delimiter: u8,
    /// The line terminator (default: CRLF)
    terminator: Terminator,
    /// Leading rows discarded before the header (default: 0)
    metadata_rows: usize,
    /// Whether the CSV has headers (default: false)
    has_headers: bool,
}

impl Default for CsvItemReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvItemReaderBuilder {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            terminator: Terminator::CRLF,
            metadata_rows: 0,
            has_headers: false,
        }
    }

    /// Sets the delimiter character for the CSV parsing.
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets the line terminator for the CSV parsing.
    pub fn terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }

    /// Number of leading rows (export timestamps, titles) skipped before the
    /// header row.
    pub fn metadata_rows(mut self, rows: usize) -> Self {
        self.metadata_rows = rows;
        self
    }

    /// Sets whether the row following the metadata rows is a header.
    ///
    /// When enabled, the header row is not returned as data; it is available
    /// through [`CsvItemReader::headers`].
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.has_headers = yes;
        self
    }

    /// Creates a `CsvItemReader` from any `Read` source.
    ///
    /// Metadata rows and the header row are consumed immediately.
    ///
    /// # Errors
    ///
    /// `BatchError::Configuration` if the source ends before the header row or
    /// one of the leading rows cannot be parsed.
    pub fn from_reader<R: Read>(self, rdr: R) -> Result<CsvItemReader<R>, BatchError> {
        let rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .delimiter(self.delimiter)
            .terminator(self.terminator)
            .has_headers(false)
            // Legacy exports carry ragged rows, cell counts are checked per row
            .flexible(true)
            .from_reader(rdr);

        let mut reader = CsvItemReader {
            reader: RefCell::new(rdr),
            record: RefCell::new(ByteRecord::new()),
            headers: None,
            exhausted: Cell::new(false),
        };

        let leading_row = |reader: &CsvItemReader<R>, what: &str| {
            reader
                .next_record()
                .map_err(|error| {
                    BatchError::Configuration(format!("Cannot read CSV {}: {}", what, error))
                })?
                .ok_or_else(|| {
                    BatchError::Configuration(format!("CSV source ends before its {}", what))
                })
        };

        for _ in 0..self.metadata_rows {
            leading_row(&reader, "metadata row")?;
        }

        if self.has_headers {
            let header = leading_row(&reader, "header row")?;
            reader.headers = Some(CsvHeaders::new(header.into_cells()));
        }

        Ok(reader)
    }

    /// Creates a `CsvItemReader` from a file path.
    ///
    /// # Errors
    ///
    /// `BatchError::Configuration` if the file does not exist or cannot be opened.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<CsvItemReader<File>, BatchError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|error| {
            BatchError::Configuration(format!(
                "CSV file not found or unreadable: {} ({})",
                path.display(),
                error
            ))
        })?;

        self.from_reader(file)
    }
}
