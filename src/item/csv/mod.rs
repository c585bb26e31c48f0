//! CSV support for reading legacy database exports.
//!
//! The reader yields raw [`CsvRow`]s instead of deserialized structs: the
//! exports this crate consumes have ragged rows, repeated column names and
//! cells that must go through field cleaning before any typing happens.
//!
//! Two source shapes are supported through [`csv_reader::CsvItemReaderBuilder`]:
//!
//! - a header row followed by data rows (`has_headers(true)`);
//! - one or more metadata rows, a header row, then data rows
//!   (`metadata_rows(n).has_headers(true)`).

/// A module providing facilities for reading CSV data records.
pub mod csv_reader;

/// One data record of a CSV source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    line: u64,
    cells: Vec<String>,
}

impl CsvRow {
    pub fn new(line: u64, cells: Vec<String>) -> Self {
        Self { line, cells }
    }

    /// 1-based line of the source where the record starts.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Cell at `index`, `None` when the row is shorter.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<String> {
        self.cells
    }
}

/// Header row of a CSV source with case- and spacing-insensitive lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvHeaders {
    names: Vec<String>,
    normalized: Vec<String>,
}

impl CsvHeaders {
    pub fn new(names: Vec<String>) -> Self {
        let names: Vec<String> = names
            .into_iter()
            .map(|name| name.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        let normalized = names.iter().map(|name| normalize(name)).collect();
        Self { names, normalized }
    }

    /// Header names as found in the source.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index of the first column called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        let name = normalize(name);
        self.normalized.iter().position(|header| *header == name)
    }

    /// Indexes of every column called `name`, in source order.
    pub fn positions(&self, name: &str) -> Vec<usize> {
        let name = normalize(name);
        self.positions_matching(|header| header == name)
    }

    /// Indexes of every column whose upper-cased, space-normalized name
    /// satisfies `predicate`, in source order.
    pub fn positions_matching<F>(&self, predicate: F) -> Vec<usize>
    where
        F: Fn(&str) -> bool,
    {
        self.normalized
            .iter()
            .enumerate()
            .filter(|(_, header)| predicate(header))
            .map(|(index, _)| index)
            .collect()
    }
}

fn normalize(name: &str) -> String {
    name.trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}
