use log::{debug, warn};

use crate::{
    core::item::{ItemProcessor, ItemProcessorResult},
    error::BatchError,
    item::csv::{CsvHeaders, CsvRow},
};

use super::{clean::clean, Product};

/// Category given to every quality master product.
pub const QUALITY_MASTER_CATEGORY: &str = "Steering Rack";

macro_rules! quality_master_columns {
    ($($column:ident => ($header:literal, $max_len:literal)),+ $(,)?) => {
        /// Source columns of the quality master export, with the maximum
        /// length of the field each one feeds.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum QualityMasterColumn {
            $($column),+
        }

        impl QualityMasterColumn {
            pub const ALL: &'static [QualityMasterColumn] = &[$(QualityMasterColumn::$column),+];

            /// Header name in the export.
            pub fn header(&self) -> &'static str {
                match self {
                    $(Self::$column => $header),+
                }
            }

            pub fn max_len(&self) -> usize {
                match self {
                    $(Self::$column => $max_len),+
                }
            }
        }
    };
}

quality_master_columns! {
    QualityNumber => ("Quality #", 100),
    PrecisionNumber => ("Precision #", 100),
    Application => ("Application", 255),
    DriverBellow => ("Driver Bellow", 100),
    PassengerBellow => ("Passenger Bellow", 100),
    TieRodDriver => ("Tie Rod Driver", 100),
    TieRodPassenger => ("Tie Rod Passenger", 100),
    CastNumber => ("CAST NUMBER", 100),
    PressureFitting => ("pressure fitting", 100),
    ReturnFitting => ("Return Fitting", 100),
    RackSimAdapter => ("Rack Sim Adapter / Driver side", 100),
    RackSimStop => ("Rack Sim Stop /Pass Side", 100),
    Cutter => ("Cutter", 100),
    Bushing => ("Bushing", 100),
    Base => ("base", 100),
    Installer => ("Installer", 100),
    Sleeve => ("Sleeve", 100),
    Timing => ("Timing", 50),
    Years => ("Years", 100),
    Ups => ("UPS", 100),
    Lps => ("LPS", 100),
    Mcs => ("MCS", 100),
    Bhs => ("BHS", 100),
    PtX4 => ("PT X 4", 100),
    Ppt => ("PPT", 100),
    ORings => ("O RINGS", 500),
    OtherParts => ("OTHER", 500),
    BushingDriver => ("Bushing Driver", 100),
    BushingPassenger => ("Bushing passenger", 100),
    BushingInsert => ("Bushing insert", 100),
    Turns => ("Turns", 50),
    Oal => ("OAL", 50),
    Comments => ("Comments", 1000),
    OeNumber => ("OE number", 255),
}

/// Builds products from the quality master export, addressing cells by header name.
///
/// The SKU is the quality number, or the precision number when the quality
/// number is missing. Rows with neither are skipped.
#[derive(Debug, Clone)]
pub struct QualityMasterProcessor {
    /// Source index of each `QualityMasterColumn`, by ordinal.
    indexes: Vec<Option<usize>>,
}

impl QualityMasterProcessor {
    /// Resolves every known column against the header row.
    ///
    /// # Errors
    ///
    /// `BatchError::Configuration` when neither business key column is present,
    /// since no row of such a file could ever be imported.
    pub fn from_headers(headers: &CsvHeaders) -> Result<Self, BatchError> {
        let indexes: Vec<Option<usize>> = QualityMasterColumn::ALL
            .iter()
            .map(|column| headers.position(column.header()))
            .collect();

        let processor = Self { indexes };

        if processor.index(QualityMasterColumn::QualityNumber).is_none()
            && processor.index(QualityMasterColumn::PrecisionNumber).is_none()
        {
            return Err(BatchError::Configuration(format!(
                "Quality master export has neither a '{}' nor a '{}' column",
                QualityMasterColumn::QualityNumber.header(),
                QualityMasterColumn::PrecisionNumber.header()
            )));
        }

        for column in QualityMasterColumn::ALL {
            if processor.index(*column).is_none() {
                warn!("Column '{}' not found, field left empty", column.header());
            }
        }

        Ok(processor)
    }

    fn index(&self, column: QualityMasterColumn) -> Option<usize> {
        self.indexes[column as usize]
    }

    fn text(&self, row: &CsvRow, column: QualityMasterColumn) -> Option<String> {
        let index = self.index(column)?;
        clean(row.get(index), Some(column.max_len()))
    }
}

impl ItemProcessor<CsvRow, Product> for QualityMasterProcessor {
    fn process(&self, row: &CsvRow) -> ItemProcessorResult<Product> {
        use QualityMasterColumn as C;

        let quality_number = self.text(row, C::QualityNumber);
        let precision_number = self.text(row, C::PrecisionNumber);

        let Some(sku) = quality_number.clone().or_else(|| precision_number.clone()) else {
            debug!("Line {}: no quality or precision number, row skipped", row.line());
            return Ok(None);
        };

        let application = self.text(row, C::Application);
        let name = application
            .clone()
            .unwrap_or_else(|| format!("Product {}", sku));

        let text = |column| self.text(row, column);

        Ok(Some(Product {
            category: Some(QUALITY_MASTER_CATEGORY.to_string()),
            precision_number,
            quality_number,
            driver_bellow: text(C::DriverBellow),
            passenger_bellow: text(C::PassengerBellow),
            tie_rod_driver: text(C::TieRodDriver),
            tie_rod_passenger: text(C::TieRodPassenger),
            cast_number: text(C::CastNumber),
            application,
            pressure_fitting: text(C::PressureFitting),
            return_fitting: text(C::ReturnFitting),
            rack_sim_adapter: text(C::RackSimAdapter),
            rack_sim_stop: text(C::RackSimStop),
            cutter: text(C::Cutter),
            bushing: text(C::Bushing),
            base: text(C::Base),
            installer: text(C::Installer),
            sleeve: text(C::Sleeve),
            timing: text(C::Timing),
            years: text(C::Years),
            ups: text(C::Ups),
            lps: text(C::Lps),
            mcs: text(C::Mcs),
            bhs: text(C::Bhs),
            pt_x4: text(C::PtX4),
            ppt: text(C::Ppt),
            o_rings: text(C::ORings),
            other_parts: text(C::OtherParts),
            bushing_driver: text(C::BushingDriver),
            bushing_passenger: text(C::BushingPassenger),
            bushing_insert: text(C::BushingInsert),
            turns: text(C::Turns),
            oal: text(C::Oal),
            comments: text(C::Comments),
            oe_number: text(C::OeNumber),
            ..Product::new(sku, name)
        }))
    }
}
