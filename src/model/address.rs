//! A1-style cell references.
//!
//! Column letters form a bijective base-26 numeral (`A` = 1 ... `Z` = 26,
//! `AA` = 27), rows are 1-based decimal. Both are stored 0-based.

use crate::error::FormatError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest row count a worksheet may declare (Excel 2007+).
pub const EXCEL_MAX_ROWS: u32 = 1_048_576;

/// Largest column count a worksheet may declare (Excel 2007+, column `XFD`).
pub const EXCEL_MAX_COLUMNS: u32 = 16_384;

/// Zero-based cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    pub row: u32,
    pub col: u32,
}

/// Upper bounds applied when resolving references from worksheet data.
///
/// A coordinate beyond a limit is treated as corruption and the cell
/// is skipped instead of inflating the output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLimits {
    pub max_rows: u32,
    pub max_columns: u32,
}

impl Default for SheetLimits {
    fn default() -> Self {
        Self {
            max_rows: EXCEL_MAX_ROWS,
            max_columns: EXCEL_MAX_COLUMNS,
        }
    }
}

impl SheetLimits {
    /// No limits beyond what fits in a `u32` coordinate.
    pub fn unbounded() -> Self {
        Self {
            max_rows: u32::MAX,
            max_columns: u32::MAX,
        }
    }
}

impl CellAddress {
    /// Create an address from zero-based coordinates.
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse an A1-style reference such as `B2` or `xfd1048576`.
    pub fn parse(reference: &str) -> Result<Self, FormatError> {
        resolve(reference)
    }

    /// Render this address as an uppercase A1-style reference.
    pub fn to_a1(&self) -> String {
        encode(*self)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_name(self.col), u64::from(self.row) + 1)
    }
}

impl FromStr for CellAddress {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve(s)
    }
}

/// Resolve a reference into a zero-based address.
///
/// The only bound applied is that both coordinates fit in a `u32`.
pub fn resolve(reference: &str) -> Result<CellAddress, FormatError> {
    resolve_within(reference, SheetLimits::unbounded())
}

/// Resolve a reference, rejecting coordinates outside `limits`.
pub fn resolve_within(reference: &str, limits: SheetLimits) -> Result<CellAddress, FormatError> {
    if reference.is_empty() {
        return Err(FormatError::Empty);
    }

    let bytes = reference.as_bytes();
    let letters = bytes.iter().take_while(|b| b.is_ascii_alphabetic()).count();
    let digits = bytes[letters..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();

    if letters + digits < bytes.len() {
        // Report the first offending character, which may be multi-byte.
        let character = reference[letters + digits..]
            .chars()
            .next()
            .unwrap_or_default();
        return Err(FormatError::InvalidCharacter {
            reference: reference.to_string(),
            character,
        });
    }
    if letters == 0 {
        return Err(FormatError::MissingColumn(reference.to_string()));
    }
    if digits == 0 {
        return Err(FormatError::MissingRow(reference.to_string()));
    }

    let row_digits = &bytes[letters..];
    if row_digits.iter().all(|&b| b == b'0') {
        return Err(FormatError::ZeroRow(reference.to_string()));
    }
    if row_digits[0] == b'0' {
        return Err(FormatError::LeadingZero(reference.to_string()));
    }

    let out_of_range = |limit| FormatError::OutOfRange {
        reference: reference.to_string(),
        limit,
    };

    let mut column: u64 = 0;
    for &b in &bytes[..letters] {
        let symbol = u64::from(b.to_ascii_uppercase() - b'A') + 1;
        column = column
            .checked_mul(26)
            .and_then(|c| c.checked_add(symbol))
            .filter(|&c| c <= u64::from(limits.max_columns))
            .ok_or_else(|| out_of_range("column"))?;
    }

    let mut row: u64 = 0;
    for &b in row_digits {
        row = row
            .checked_mul(10)
            .and_then(|r| r.checked_add(u64::from(b - b'0')))
            .filter(|&r| r <= u64::from(limits.max_rows))
            .ok_or_else(|| out_of_range("row"))?;
    }

    // Both are >= 1 here and bounded by a u32 limit.
    Ok(CellAddress {
        row: (row - 1) as u32,
        col: (column - 1) as u32,
    })
}

/// Encode an address as an uppercase A1-style reference.
pub fn encode(address: CellAddress) -> String {
    address.to_string()
}

/// Column letters for a zero-based column index (`0` -> `A`, `26` -> `AA`).
pub fn column_name(col: u32) -> String {
    let mut n = u64::from(col) + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    letters.reverse();
    // Only ASCII uppercase letters were pushed.
    letters.into_iter().map(char::from).collect()
}
