//! Error types for the sheetrescue library.
//!
//! Two of the variants are recoverable by contract: a [`FormatError`] only
//! costs the offending cell, and a [`StructuralError`] only costs the
//! worksheet it occurred in. Everything else concerns the archive itself.

use std::io;
use thiserror::Error;

/// Result type alias for sheetrescue operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while extracting a workbook.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error reading ZIP archive.
    #[error("ZIP archive error: {0}")]
    ZipArchive(String),

    /// Error parsing an auxiliary XML part (workbook, relationships, shared strings).
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// A required archive part is missing.
    #[error("Missing component: {0}")]
    MissingComponent(String),

    /// The archive is a ZIP file but not a spreadsheet workbook.
    #[error("Not a spreadsheet archive: {0}")]
    NotSpreadsheet(String),

    /// A single cell could not be interpreted. The cell is skipped.
    #[error("Cell skipped: {0}")]
    Format(#[from] FormatError),

    /// The worksheet XML is truncated or ill-formed. The worksheet is abandoned.
    #[error("Worksheet structure error: {0}")]
    Structural(#[from] StructuralError),

    /// Error while writing delimited output.
    #[error("CSV error: {0}")]
    Csv(String),

    /// Error while serializing a report.
    #[error("JSON serialization error: {0}")]
    Json(String),
}

impl Error {
    /// Whether a cell stream may continue after yielding this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Format(_))
    }
}

/// A cell reference or cell value that cannot be interpreted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The reference text is empty.
    #[error("empty cell reference")]
    Empty,

    /// No column letters precede the row number.
    #[error("cell reference '{0}' has no column letters")]
    MissingColumn(String),

    /// No row digits follow the column letters.
    #[error("cell reference '{0}' has no row number")]
    MissingRow(String),

    /// Rows are 1-based in the source text.
    #[error("cell reference '{0}' has row zero")]
    ZeroRow(String),

    /// The row number is written with a leading zero, e.g. `A01`.
    #[error("cell reference '{0}' has a leading zero in its row number")]
    LeadingZero(String),

    /// A character outside `[A-Za-z0-9]` or letters after the row digits.
    #[error("cell reference '{reference}' contains unexpected character {character:?}")]
    InvalidCharacter { reference: String, character: char },

    /// The coordinate lies beyond the configured sheet limits.
    #[error("cell reference '{reference}' lies beyond the {limit} limit")]
    OutOfRange {
        reference: String,
        limit: &'static str,
    },

    /// A cell with content but no `r` attribute.
    #[error("cell with content has no reference attribute")]
    MissingReference,

    /// A shared-string cell whose index is not a valid table index.
    #[error("cell '{reference}' points at shared string '{index}', which does not exist")]
    SharedStringIndex { reference: String, index: String },

    /// The cell text contains an escape sequence that cannot be decoded.
    #[error("cell '{reference}' has an undecodable value: {detail}")]
    Escape { reference: String, detail: String },
}

/// The worksheet XML token stream is truncated or inconsistent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("at byte {position}: {message}")]
pub struct StructuralError {
    /// Byte offset in the worksheet part where parsing stopped.
    pub position: u64,
    /// Description of the problem.
    pub message: String,
}

impl StructuralError {
    pub(crate) fn new(position: u64, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ZipArchive(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlParse(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Csv(err.to_string())
    }
}
