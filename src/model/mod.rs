//! Data model shared by the worksheet parser and the serializer.
//!
//! Cell references resolve to [`CellAddress`] values, the parser emits
//! [`CellEvent`]s, and a [`TableBuilder`] turns those into a dense [`Table`].

mod address;
mod table;

pub use address::*;
pub use table::*;
