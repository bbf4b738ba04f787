//! Spreadsheet archive detection.

use crate::container::SpreadsheetArchive;
use crate::error::{Error, Result};
use std::path::Path;

/// ZIP file magic bytes: PK\x03\x04
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Main-part content types of SpreadsheetML workbooks (.xlsx, .xlsm, .xltx, .xltm).
const SPREADSHEET_CONTENT_TYPES: [&str; 4] = [
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
    "application/vnd.ms-excel.sheet.macroEnabled.main+xml",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.template.main+xml",
    "application/vnd.ms-excel.template.macroEnabled.main+xml",
];

/// Check if data starts with ZIP magic bytes.
pub fn is_zip_file(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == ZIP_MAGIC
}

/// Verify that an opened archive holds a SpreadsheetML workbook.
///
/// `[Content_Types].xml` is consulted first. Damaged files often lose it, so
/// an `xl/` folder is accepted as a fallback.
pub fn ensure_spreadsheet(archive: &SpreadsheetArchive) -> Result<()> {
    if let Ok(content_types) = archive.read_xml("[Content_Types].xml") {
        if SPREADSHEET_CONTENT_TYPES
            .iter()
            .any(|ct| content_types.contains(ct))
        {
            return Ok(());
        }
    }

    if archive.list_files().iter().any(|n| n.starts_with("xl/")) {
        Ok(())
    } else {
        Err(Error::NotSpreadsheet(
            "no workbook content type and no xl/ folder".to_string(),
        ))
    }
}

/// Check whether `data` is a ZIP archive holding a spreadsheet workbook.
pub fn is_spreadsheet(data: &[u8]) -> bool {
    is_zip_file(data)
        && SpreadsheetArchive::from_bytes(data.to_vec())
            .and_then(|archive| ensure_spreadsheet(&archive))
            .is_ok()
}

/// Check whether the file at `path` is a spreadsheet workbook.
pub fn is_spreadsheet_file(path: impl AsRef<Path>) -> Result<bool> {
    let data = std::fs::read(path)?;
    Ok(is_spreadsheet(&data))
}
