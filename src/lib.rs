//! # sheetrescue
//!
//! Recovers tabular data from damaged or bloated `.xlsx` workbooks.
//!
//! Worksheets that declare millions of empty, styled cells, or that were cut
//! off halfway, are a poor fit for DOM-based readers. This crate streams each
//! worksheet part, keeps only cells that actually hold text, and rebuilds a
//! dense table from their bounding box. Malformed cells are skipped one at a
//! time; a broken worksheet only costs that worksheet.
//!
//! ## Quick Start
//!
//! ```no_run
//! // Write `report_sheet1.csv`, `report_sheet2.csv`, ... next to the input
//! let report = sheetrescue::convert_file("report.xlsx")?;
//! for path in report.outputs() {
//!     println!("saved {}", path.display());
//! }
//!
//! // Or keep the tables in memory
//! for sheet in sheetrescue::extract_file("report.xlsx")? {
//!     println!("{}: {} rows", sheet.name, sheet.outcome.table().row_count());
//! }
//! # Ok::<(), sheetrescue::Error>(())
//! ```
//!
//! ## Lower-Level APIs
//!
//! ```no_run
//! use sheetrescue::diagnostics::Diagnostic;
//! use sheetrescue::{extract_sheet, ExtractOptions, SharedStrings};
//!
//! let xml = r#"<worksheet><sheetData><row><c r="B2"><v>7</v></c></row></sheetData></worksheet>"#;
//! let mut diagnostics: Vec<Diagnostic> = Vec::new();
//! let outcome = extract_sheet(
//!     xml.as_bytes(),
//!     &SharedStrings::default(),
//!     &ExtractOptions::default(),
//!     "sheet1",
//!     &mut diagnostics,
//! );
//! let csv = sheetrescue::render::to_csv(outcome.table(), &Default::default())?;
//! assert_eq!(csv, ",\r\n,7\r\n");
//! # Ok::<(), sheetrescue::Error>(())
//! ```

pub mod container;
pub mod detect;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod model;
pub mod options;
pub mod render;
pub mod xlsx;

// Re-exports
pub use container::{Relationship, Relationships, SpreadsheetArchive};
pub use detect::{is_spreadsheet, is_spreadsheet_file};
pub use diagnostics::{Diagnostic, DiagnosticsSink, LogSink, SheetStats};
pub use error::{Error, FormatError, Result, StructuralError};
pub use extract::{
    extract_sheet, ConversionReport, Converter, ExtractedSheet, SheetOutcome, SheetReport,
    SheetStatus,
};
pub use model::{CellAddress, CellEvent, SheetLimits, Table};
pub use options::{ExtractOptions, SheetNaming, DEFAULT_MAX_CELLS};
pub use xlsx::{CellStream, SharedStrings, Workbook, WorksheetPart};

use std::path::Path;

/// Convert every worksheet of a workbook into delimited files beside it.
///
/// Diagnostics go to the `log` facade.
///
/// # Example
///
/// ```no_run
/// let report = sheetrescue::convert_file("damaged.xlsx")?;
/// println!("{} cells recovered", report.total_cells());
/// # Ok::<(), sheetrescue::Error>(())
/// ```
pub fn convert_file(path: impl AsRef<Path>) -> Result<ConversionReport> {
    Converter::default().convert_file(path, None, &mut LogSink)
}

/// Convert a workbook with options, writing into `output_dir`.
///
/// # Example
///
/// ```no_run
/// use sheetrescue::{convert_file_with_options, ExtractOptions, SheetNaming};
///
/// let options = ExtractOptions::new()
///     .with_delimiter(b';')
///     .with_sheet_naming(SheetNaming::Title);
///
/// let report = convert_file_with_options("damaged.xlsx", "out", &options)?;
/// # Ok::<(), sheetrescue::Error>(())
/// ```
pub fn convert_file_with_options(
    path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<ConversionReport> {
    Converter::new(options.clone()).convert_file(path, Some(output_dir.as_ref()), &mut LogSink)
}

/// Extract every worksheet of a workbook file into memory.
pub fn extract_file(path: impl AsRef<Path>) -> Result<Vec<ExtractedSheet>> {
    let workbook = Workbook::open(path)?;
    Ok(Converter::default().extract_workbook(&workbook, &mut LogSink))
}

/// Extract every worksheet of an in-memory workbook.
///
/// # Example
///
/// ```no_run
/// let data = std::fs::read("damaged.xlsx")?;
/// let sheets = sheetrescue::extract_bytes(data)?;
/// # Ok::<(), sheetrescue::Error>(())
/// ```
pub fn extract_bytes(data: Vec<u8>) -> Result<Vec<ExtractedSheet>> {
    let workbook = Workbook::from_bytes(data)?;
    Ok(Converter::default().extract_workbook(&workbook, &mut LogSink))
}
