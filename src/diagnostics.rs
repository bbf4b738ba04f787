//! Structured diagnostics emitted while extracting worksheets.
//!
//! The extraction core never formats progress text itself. It reports
//! [`Diagnostic`] values to a [`DiagnosticsSink`] and leaves rendering to the
//! caller: the CLI prints them, tests collect them into a `Vec`, and
//! [`LogSink`] forwards them to the `log` facade.

use crate::error::{FormatError, StructuralError};
use serde::Serialize;

/// Per-worksheet extraction counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SheetStats {
    /// Cells that ended up in the table
    pub cells: usize,
    /// Rows in the dense table
    pub rows: usize,
    /// Columns in the dense table
    pub columns: usize,
    /// Cells skipped because of format errors
    pub skipped: usize,
}

/// One event worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Number of worksheets about to be processed.
    SheetsFound { count: usize },
    /// A cell could not be interpreted and was left out.
    CellSkipped { sheet: String, error: FormatError },
    /// A worksheet produced a table.
    SheetExtracted { sheet: String, stats: SheetStats },
    /// A worksheet held no data.
    SheetEmpty { sheet: String },
    /// A worksheet's XML broke off; whatever was read before is kept.
    SheetAborted {
        sheet: String,
        error: StructuralError,
    },
}

/// Receiver of [`Diagnostic`] events.
pub trait DiagnosticsSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticsSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

impl<S: DiagnosticsSink + ?Sized> DiagnosticsSink for &mut S {
    fn report(&mut self, diagnostic: Diagnostic) {
        (**self).report(diagnostic);
    }
}

/// Sink that forwards diagnostics to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticsSink for LogSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::SheetsFound { count } => log::debug!("{} worksheet(s) found", count),
            Diagnostic::CellSkipped { sheet, error } => {
                log::warn!("{}: skipped cell: {}", sheet, error)
            }
            Diagnostic::SheetExtracted { sheet, stats } => log::info!(
                "{}: {} cell(s), {} row(s) x {} column(s), {} skipped",
                sheet,
                stats.cells,
                stats.rows,
                stats.columns,
                stats.skipped
            ),
            Diagnostic::SheetEmpty { sheet } => log::info!("{}: no data", sheet),
            Diagnostic::SheetAborted { sheet, error } => {
                log::warn!("{}: worksheet abandoned {}", sheet, error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_sink_collects_in_order() {
        let mut sink: Vec<Diagnostic> = Vec::new();
        sink.report(Diagnostic::SheetsFound { count: 2 });
        sink.report(Diagnostic::SheetEmpty {
            sheet: "sheet2".into(),
        });
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[0], Diagnostic::SheetsFound { count: 2 });
    }

    #[test]
    fn test_sink_through_mut_reference() {
        fn emit(mut sink: impl DiagnosticsSink) {
            sink.report(Diagnostic::SheetsFound { count: 1 });
        }

        let mut sink: Vec<Diagnostic> = Vec::new();
        emit(&mut sink);
        emit(LogSink);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_stats_serialize() {
        let stats = SheetStats {
            cells: 1,
            rows: 1,
            columns: 1,
            skipped: 3,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert_eq!(json, r#"{"cells":1,"rows":1,"columns":1,"skipped":3}"#);
    }
}
