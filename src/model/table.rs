//! Sparse cell events and the dense table built from them.

use super::CellAddress;
use crate::error::FormatError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A populated cell read from a worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellEvent {
    /// Zero-based coordinate
    pub address: CellAddress,
    /// Resolved cell text (shared strings already looked up)
    pub value: String,
}

impl CellEvent {
    /// Create a new cell event.
    pub fn new(address: CellAddress, value: impl Into<String>) -> Self {
        Self {
            address,
            value: value.into(),
        }
    }
}

/// Smallest rectangle anchored at `A1` containing every observed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub max_row: u32,
    pub max_col: u32,
}

impl BoundingBox {
    /// Grow the box so it covers `address`.
    pub fn include(&mut self, address: CellAddress) {
        self.max_row = self.max_row.max(address.row);
        self.max_col = self.max_col.max(address.col);
    }

    /// Number of rows covered.
    pub fn rows(&self) -> usize {
        self.max_row as usize + 1
    }

    /// Number of columns covered.
    pub fn columns(&self) -> usize {
        self.max_col as usize + 1
    }

    /// Number of positions in the dense grid.
    pub fn area(&self) -> u64 {
        (u64::from(self.max_row) + 1).saturating_mul(u64::from(self.max_col) + 1)
    }
}

impl From<CellAddress> for BoundingBox {
    fn from(address: CellAddress) -> Self {
        Self {
            max_row: address.row,
            max_col: address.col,
        }
    }
}

/// Accumulates cell events for one worksheet.
///
/// Memory grows with the number of distinct populated cells only. A repeated
/// address replaces the earlier value. With a cell limit set, [`try_push`]
/// refuses events that would grow the dense grid past it.
///
/// [`try_push`]: TableBuilder::try_push
#[derive(Debug, Default)]
pub struct TableBuilder {
    cells: HashMap<CellAddress, String>,
    bounds: Option<BoundingBox>,
    max_cells: Option<u64>,
}

impl TableBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty builder whose table may hold at most `max_cells`
    /// positions.
    pub fn with_cell_limit(max_cells: u64) -> Self {
        Self {
            max_cells: Some(max_cells.max(1)),
            ..Self::default()
        }
    }

    /// Record one cell event unless it would grow the table past the
    /// cell limit. A refused event leaves the builder unchanged.
    pub fn try_push(&mut self, event: CellEvent) -> Result<(), FormatError> {
        if let Some(max_cells) = self.max_cells {
            let mut grown = self.bounds.unwrap_or_else(|| event.address.into());
            grown.include(event.address);
            if grown.area() > max_cells {
                return Err(FormatError::OutOfRange {
                    reference: event.address.to_a1(),
                    limit: "table size",
                });
            }
        }
        self.push(event);
        Ok(())
    }

    /// Record one cell event, ignoring any cell limit.
    pub fn push(&mut self, event: CellEvent) {
        match self.bounds.as_mut() {
            Some(bounds) => bounds.include(event.address),
            None => self.bounds = Some(event.address.into()),
        }
        self.cells.insert(event.address, event.value);
    }

    /// Bounding box of everything pushed so far, `None` while empty.
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.bounds
    }

    /// Number of distinct cells recorded.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Check if no cells were recorded.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Materialize the dense table.
    pub fn finish(self) -> Table {
        let Some(bounds) = self.bounds else {
            return Table::new();
        };

        let columns = bounds.columns();
        let mut rows = vec![vec![String::new(); columns]; bounds.rows()];
        for (address, value) in self.cells {
            rows[address.row as usize][address.col as usize] = value;
        }

        Table { rows }
    }
}

impl Extend<CellEvent> for TableBuilder {
    fn extend<I: IntoIterator<Item = CellEvent>>(&mut self, iter: I) {
        for event in iter {
            self.push(event);
        }
    }
}

/// Build a dense table from a sequence of cell events.
///
/// An empty sequence yields a table with zero rows.
pub fn build(events: impl IntoIterator<Item = CellEvent>) -> Table {
    let mut builder = TableBuilder::new();
    builder.extend(events);
    builder.finish()
}

/// A dense rectangular grid of cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Rows in this table, each with the same number of values
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value at `address`, `None` outside the table.
    pub fn get(&self, address: CellAddress) -> Option<&str> {
        self.rows
            .get(address.row as usize)?
            .get(address.col as usize)
            .map(String::as_str)
    }

    /// Number of positions holding non-empty text.
    pub fn populated_count(&self) -> usize {
        self.rows
            .iter()
            .flatten()
            .filter(|value| !value.is_empty())
            .count()
    }
}
