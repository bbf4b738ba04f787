//! Extraction options.

use crate::model::SheetLimits;
use crate::render::{CsvOptions, LineTerminator};

/// Default upper bound on the positions in one worksheet's dense table.
pub const DEFAULT_MAX_CELLS: u64 = 10_000_000;

/// How output files for each worksheet are named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SheetNaming {
    /// `sheetN`, taken from the worksheet part file name
    #[default]
    PartName,
    /// The tab title from the workbook, sanitized for use in a file name
    Title,
}

/// Options controlling worksheet extraction and output.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Coordinates beyond these limits are skipped as corrupt
    pub limits: SheetLimits,

    /// Cells that would grow a worksheet's table past this many positions
    /// are skipped as corrupt
    pub max_cells: u64,

    /// Delimited-text output settings
    pub csv: CsvOptions,

    /// Naming scheme for output files
    pub sheet_naming: SheetNaming,

    /// Write no file for worksheets without data
    pub skip_empty_sheets: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            limits: SheetLimits::default(),
            max_cells: DEFAULT_MAX_CELLS,
            csv: CsvOptions::default(),
            sheet_naming: SheetNaming::PartName,
            skip_empty_sheets: true,
        }
    }
}

impl ExtractOptions {
    /// Create new extraction options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum accepted row count.
    pub fn with_max_rows(mut self, rows: u32) -> Self {
        self.limits.max_rows = rows.max(1);
        self
    }

    /// Set the maximum accepted column count.
    pub fn with_max_columns(mut self, columns: u32) -> Self {
        self.limits.max_columns = columns.max(1);
        self
    }

    /// Set the maximum number of positions in one worksheet's table.
    pub fn with_max_cells(mut self, cells: u64) -> Self {
        self.max_cells = cells.max(1);
        self
    }

    /// Set the output field delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.csv.delimiter = delimiter;
        self
    }

    /// Set the output line terminator.
    pub fn with_line_terminator(mut self, terminator: LineTerminator) -> Self {
        self.csv.line_terminator = terminator;
        self
    }

    /// Set the output file naming scheme.
    pub fn with_sheet_naming(mut self, naming: SheetNaming) -> Self {
        self.sheet_naming = naming;
        self
    }

    /// Whether empty worksheets are skipped instead of written as empty files.
    pub fn with_skip_empty_sheets(mut self, skip: bool) -> Self {
        self.skip_empty_sheets = skip;
        self
    }
}
