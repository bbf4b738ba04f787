//! SpreadsheetML (.xlsx) workbook reading.
//!
//! Worksheets are never materialized as DOM trees. [`CellStream`] pulls
//! populated cells out of a worksheet part one event at a time, so memory
//! follows the number of populated cells rather than the number of
//! `<c>` elements in the part.
//!
//! # Example
//!
//! ```no_run
//! use sheetrescue::xlsx::{CellStream, Workbook};
//!
//! let workbook = Workbook::open("damaged.xlsx")?;
//! for part in workbook.worksheets() {
//!     let cells = workbook.with_sheet(part, |reader, shared| {
//!         CellStream::new(reader, shared).filter_map(|c| c.ok()).count()
//!     })?;
//!     println!("{}: {} cells", part.display_name(), cells);
//! }
//! # Ok::<(), sheetrescue::Error>(())
//! ```

mod shared_strings;
mod stream;
mod workbook;

pub use shared_strings::SharedStrings;
pub use stream::CellStream;
pub use workbook::{Workbook, WorksheetPart};
