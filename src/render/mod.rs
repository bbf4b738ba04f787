//! Output rendering for extracted tables.
//!
//! Tables become delimited-text lines; conversion reports become JSON.
//!
//! # Example
//!
//! ```
//! use sheetrescue::model::{build, CellAddress, CellEvent};
//! use sheetrescue::render::serialize;
//!
//! let table = build(vec![
//!     CellEvent::new(CellAddress::new(0, 0), "name"),
//!     CellEvent::new(CellAddress::new(1, 1), "a, b"),
//! ]);
//! let lines: Vec<String> = serialize(&table).collect::<Result<_, _>>()?;
//! assert_eq!(lines, vec!["name,", ",\"a, b\""]);
//! # Ok::<(), sheetrescue::Error>(())
//! ```

mod delimited;
mod json;
mod options;

pub use delimited::{serialize, serialize_with, to_csv, write_table, CsvLines};
pub use json::{to_json, JsonFormat};
pub use options::{CsvOptions, LineTerminator};
