use std::collections::HashSet;

use log::{debug, warn};

use crate::{
    core::item::{ItemProcessor, ItemProcessorResult},
    error::BatchError,
    item::csv::{CsvHeaders, CsvRow},
};

use super::{
    clean::{clean, format_cents, join_parts, parse_currency, parse_decimal, truncate},
    Product,
};

/// Rows with fewer cells are blank or truncated lines of the export.
pub const MIN_CELLS: usize = 10;

/// Category used when the export leaves it empty.
pub const DEFAULT_CATEGORY: &str = "Remanufactured";

/// Header shared by the run of engine columns.
const ENGINE_HEADER: &str = "ENGINE";

const COLUMN_COUNT: usize = 20;

/// Named columns of the remanufactured products export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemanColumn {
    Sku,
    Name,
    AdditionalNotes,
    ApplicationNotes,
    PartNumber,
    ProductCategory,
    Type,
    Year,
    PrimaryOem,
    AdditionalOem,
    Manufacturer,
    Make,
    Condition,
    Reman,
    Price,
    VendorCost,
    ActualCost,
    Weight,
    Core,
    CorePrice,
}

impl RemanColumn {
    pub const ALL: [RemanColumn; COLUMN_COUNT] = [
        Self::Sku,
        Self::Name,
        Self::AdditionalNotes,
        Self::ApplicationNotes,
        Self::PartNumber,
        Self::ProductCategory,
        Self::Type,
        Self::Year,
        Self::PrimaryOem,
        Self::AdditionalOem,
        Self::Manufacturer,
        Self::Make,
        Self::Condition,
        Self::Reman,
        Self::Price,
        Self::VendorCost,
        Self::ActualCost,
        Self::Weight,
        Self::Core,
        Self::CorePrice,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            Self::Sku => "SKU",
            Self::Name => "NAME",
            Self::AdditionalNotes => "ADDITIONAL NOTES",
            Self::ApplicationNotes => "APPLICATION NOTES",
            Self::PartNumber => "PART NUMBER",
            Self::ProductCategory => "PRODUCT CATEGORY",
            Self::Type => "TYPE",
            Self::Year => "YEAR",
            Self::PrimaryOem => "PRIMARY OEM",
            Self::AdditionalOem => "ADDITIONAL OEM",
            Self::Manufacturer => "MANUFACTURER",
            Self::Make => "MAKE",
            Self::Condition => "CONDITION",
            Self::Reman => "REMAN",
            Self::Price => "PRICE",
            Self::VendorCost => "VENDOR COST",
            Self::ActualCost => "ACTUAL COST",
            Self::Weight => "WEIGHT",
            Self::Core => "CORE",
            Self::CorePrice => "CORE PRICE",
        }
    }

    /// Columns without which no row can be built.
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Sku | Self::Name)
    }
}

/// Column positions of a reman export, resolved from its header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemanLayout {
    indexes: [Option<usize>; COLUMN_COUNT],
    engines: Vec<usize>,
}

impl RemanLayout {
    /// # Errors
    ///
    /// `BatchError::Configuration` when a required column is absent.
    pub fn from_headers(headers: &CsvHeaders) -> Result<Self, BatchError> {
        let mut indexes = [None; COLUMN_COUNT];
        let mut missing_required = Vec::new();

        for column in RemanColumn::ALL {
            indexes[column as usize] = headers.position(column.header());

            if indexes[column as usize].is_none() {
                if column.is_required() {
                    missing_required.push(column.header());
                } else {
                    warn!("Column '{}' not found, field left empty", column.header());
                }
            }
        }

        if !missing_required.is_empty() {
            return Err(BatchError::Configuration(format!(
                "Reman export is missing required column(s): {}",
                missing_required.join(", ")
            )));
        }

        let engines = headers.positions_matching(is_engine_header);
        if engines.is_empty() {
            warn!("No '{}' columns found, application will omit engines", ENGINE_HEADER);
        }

        Ok(Self { indexes, engines })
    }

    pub fn index(&self, column: RemanColumn) -> Option<usize> {
        self.indexes[column as usize]
    }

    pub fn engine_indexes(&self) -> &[usize] {
        &self.engines
    }
}

/// `ENGINE`, or `ENGINE` followed by a number (`ENGINE 2`).
fn is_engine_header(header: &str) -> bool {
    match header.strip_prefix(ENGINE_HEADER) {
        Some("") => true,
        Some(rest) => {
            let number = rest.trim_start();
            !number.is_empty() && number.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Builds products from the remanufactured products export.
///
/// Composite fields are assembled from the cleaned cells:
///
/// - description: notes, application notes, manufacturer, condition, reman
///   and core exchange flags, joined with `" | "`
/// - application: make, engines and `(year)`, joined with `" "`
/// - comments: OEM numbers and a differing part number, joined with `" | "`
#[derive(Debug, Clone)]
pub struct RemanProcessor {
    layout: RemanLayout,
}

impl RemanProcessor {
    pub fn new(layout: RemanLayout) -> Self {
        Self { layout }
    }

    pub fn from_headers(headers: &CsvHeaders) -> Result<Self, BatchError> {
        Ok(Self::new(RemanLayout::from_headers(headers)?))
    }

    fn cell<'r>(&self, row: &'r CsvRow, column: RemanColumn) -> Option<&'r str> {
        row.get(self.layout.index(column)?)
    }

    fn text(&self, row: &CsvRow, column: RemanColumn) -> Option<String> {
        clean(self.cell(row, column), None)
    }

    fn text_max(&self, row: &CsvRow, column: RemanColumn, max_len: usize) -> Option<String> {
        clean(self.cell(row, column), Some(max_len))
    }

    fn price(&self, row: &CsvRow, column: RemanColumn) -> Option<i64> {
        parse_currency(self.cell(row, column))
    }

    fn flag(&self, row: &CsvRow, column: RemanColumn) -> bool {
        self.text(row, column)
            .is_some_and(|value| value.eq_ignore_ascii_case("yes"))
    }

    /// Distinct engines in source order, joined with `", "`.
    fn engines(&self, row: &CsvRow) -> Option<String> {
        let mut seen = HashSet::new();
        let engines = self
            .layout
            .engine_indexes()
            .iter()
            .filter_map(|index| clean(row.get(*index), None))
            .filter(|engine| seen.insert(engine.clone()))
            .map(Some);

        join_parts(engines, ", ")
    }
}

impl ItemProcessor<CsvRow, Product> for RemanProcessor {
    fn process(&self, row: &CsvRow) -> ItemProcessorResult<Product> {
        use RemanColumn as C;

        if row.len() < MIN_CELLS {
            debug!(
                "Line {}: {} cells, at least {} expected, row skipped",
                row.line(),
                row.len(),
                MIN_CELLS
            );
            return Ok(None);
        }

        let Some(sku) = self.text_max(row, C::Sku, 100) else {
            debug!("Line {}: no SKU, row skipped", row.line());
            return Ok(None);
        };

        let year = self.text(row, C::Year);
        let primary_oem = self.text(row, C::PrimaryOem);
        let part_number = self.text(row, C::PartNumber);
        let core_price = self.price(row, C::CorePrice);

        let description = join_parts(
            [
                self.text(row, C::AdditionalNotes),
                self.text(row, C::ApplicationNotes)
                    .map(|notes| format!("Application: {}", notes)),
                self.text(row, C::Manufacturer)
                    .map(|manufacturer| format!("Manufacturer: {}", manufacturer)),
                self.text(row, C::Condition)
                    .map(|condition| format!("Condition: {}", condition)),
                self.flag(row, C::Reman)
                    .then(|| "Remanufactured In-House".to_string()),
                core_price
                    .filter(|cents| *cents != 0 && self.flag(row, C::Core))
                    .map(|cents| format!("Core Exchange: {}", format_cents(cents))),
            ],
            " | ",
        );

        let application = join_parts(
            [
                self.text(row, C::Make),
                self.engines(row),
                year.as_ref().map(|year| format!("({})", year)),
            ],
            " ",
        )
        .map(|application| truncate(application, 255));

        let comments = join_parts(
            [
                primary_oem.as_ref().map(|oem| format!("OEM: {}", oem)),
                self.text(row, C::AdditionalOem)
                    .map(|oem| format!("Alt OEM: {}", oem)),
                part_number
                    .filter(|part| *part != sku)
                    .map(|part| format!("Part#: {}", part)),
            ],
            " | ",
        );

        let name = self.text_max(row, C::Name, 255).unwrap_or_else(|| {
            let fallback = join_parts([self.text(row, C::Type), Some(sku.clone())], " ");
            truncate(fallback.unwrap_or_else(|| sku.clone()), 255)
        });

        let unit_cost = self
            .price(row, C::ActualCost)
            .or_else(|| self.price(row, C::VendorCost));

        Ok(Some(Product {
            description,
            category: Some(
                self.text_max(row, C::ProductCategory, 128)
                    .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            ),
            application,
            years: year.map(|year| truncate(year, 100)),
            oe_number: primary_oem.map(|oem| truncate(oem, 255)),
            comments,
            weight: parse_decimal(self.cell(row, C::Weight)),
            unit_price: self.price(row, C::Price),
            unit_cost,
            ..Product::new(sku, name)
        }))
    }
}
