//! Per-worksheet extraction and delimited-file output.
//!
//! [`extract_sheet`] drives one worksheet part through the cell stream and
//! the table builder. [`Converter`] does that for every worksheet of an
//! archive and writes one delimited file per worksheet.

use crate::container::{decode_xml_bytes, Bom};
use crate::diagnostics::{Diagnostic, DiagnosticsSink, SheetStats};
use crate::error::{Error, Result, StructuralError};
use crate::model::{Table, TableBuilder};
use crate::options::{ExtractOptions, SheetNaming};
use crate::render::write_table;
use crate::xlsx::{CellStream, SharedStrings, Workbook, WorksheetPart};
use serde::Serialize;
use std::collections::HashSet;
use std::convert::Infallible;
use std::fs;
use std::io::{BufRead, BufWriter, Read};
use std::path::{Path, PathBuf};

/// Result of extracting one worksheet.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetOutcome {
    /// The whole worksheet part was read.
    Complete { table: Table, stats: SheetStats },
    /// The worksheet part broke off. `table` holds the cells read before that.
    Aborted {
        table: Table,
        stats: SheetStats,
        error: StructuralError,
    },
}

impl SheetOutcome {
    /// The extracted (possibly partial) table.
    pub fn table(&self) -> &Table {
        match self {
            SheetOutcome::Complete { table, .. } | SheetOutcome::Aborted { table, .. } => table,
        }
    }

    pub fn stats(&self) -> SheetStats {
        match self {
            SheetOutcome::Complete { stats, .. } | SheetOutcome::Aborted { stats, .. } => *stats,
        }
    }

    /// The structural error that ended the worksheet early, if any.
    pub fn error(&self) -> Option<&StructuralError> {
        match self {
            SheetOutcome::Complete { .. } => None,
            SheetOutcome::Aborted { error, .. } => Some(error),
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, SheetOutcome::Aborted { .. })
    }

    pub fn into_table(self) -> Table {
        match self {
            SheetOutcome::Complete { table, .. } | SheetOutcome::Aborted { table, .. } => table,
        }
    }
}

/// Extract one worksheet part into a dense table.
///
/// Never fails: format errors skip single cells and are reported to `sink`,
/// a structural error ends the worksheet with [`SheetOutcome::Aborted`].
/// UTF-16 parts (detected by their byte-order mark) are transcoded first.
pub fn extract_sheet<R: BufRead>(
    mut reader: R,
    shared_strings: &SharedStrings,
    options: &ExtractOptions,
    sheet: &str,
    sink: &mut dyn DiagnosticsSink,
) -> SheetOutcome {
    let bom = match reader.fill_buf() {
        Ok(head) => Bom::detect(head),
        Err(e) => return finish(TableBuilder::new(), 0, Some(io_abort(e)), sheet, sink),
    };

    match bom {
        Some(bom) if bom.is_utf16() => {
            let mut bytes = Vec::new();
            if let Err(e) = reader.read_to_end(&mut bytes) {
                return finish(TableBuilder::new(), 0, Some(io_abort(e)), sheet, sink);
            }
            match decode_xml_bytes(&bytes) {
                Ok(text) => run(text.as_bytes(), shared_strings, options, sheet, sink),
                Err(e) => finish(
                    TableBuilder::new(),
                    0,
                    Some(StructuralError::new(0, e.to_string())),
                    sheet,
                    sink,
                ),
            }
        }
        Some(bom) => {
            reader.consume(bom.byte_len());
            run(reader, shared_strings, options, sheet, sink)
        }
        None => run(reader, shared_strings, options, sheet, sink),
    }
}

fn io_abort(err: std::io::Error) -> StructuralError {
    StructuralError::new(0, err.to_string())
}

fn run<R: BufRead>(
    reader: R,
    shared_strings: &SharedStrings,
    options: &ExtractOptions,
    sheet: &str,
    sink: &mut dyn DiagnosticsSink,
) -> SheetOutcome {
    let mut stream = CellStream::with_limits(reader, shared_strings, options.limits);
    let mut builder = TableBuilder::with_cell_limit(options.max_cells);
    let mut skipped = 0;

    let aborted = loop {
        let item = match stream.next() {
            Some(item) => item,
            None => break None,
        };
        let refused = match item {
            Ok(event) => match builder.try_push(event) {
                Ok(()) => continue,
                Err(error) => error,
            },
            Err(Error::Format(error)) => error,
            Err(Error::Structural(error)) => break Some(error),
            Err(other) => break Some(StructuralError::new(stream.position(), other.to_string())),
        };
        skipped += 1;
        sink.report(Diagnostic::CellSkipped {
            sheet: sheet.to_string(),
            error: refused,
        });
    };

    finish(builder, skipped, aborted, sheet, sink)
}

fn finish(
    builder: TableBuilder,
    skipped: usize,
    aborted: Option<StructuralError>,
    sheet: &str,
    sink: &mut dyn DiagnosticsSink,
) -> SheetOutcome {
    let cells = builder.cell_count();
    let table = builder.finish();
    let stats = SheetStats {
        cells,
        rows: table.row_count(),
        columns: table.column_count(),
        skipped,
    };

    if let Some(error) = &aborted {
        sink.report(Diagnostic::SheetAborted {
            sheet: sheet.to_string(),
            error: error.clone(),
        });
    }
    if table.is_empty() {
        sink.report(Diagnostic::SheetEmpty {
            sheet: sheet.to_string(),
        });
    } else {
        sink.report(Diagnostic::SheetExtracted {
            sheet: sheet.to_string(),
            stats,
        });
    }

    match aborted {
        None => SheetOutcome::Complete { table, stats },
        Some(error) => SheetOutcome::Aborted {
            table,
            stats,
            error,
        },
    }
}

/// A worksheet extracted in memory.
#[derive(Debug, Clone)]
pub struct ExtractedSheet {
    /// Label used for diagnostics and output file names
    pub name: String,
    pub part: WorksheetPart,
    pub outcome: SheetOutcome,
}

/// What happened to one worksheet during a file conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetStatus {
    /// A delimited file was written
    Written,
    /// No data; no file written
    Empty,
    /// The worksheet broke off; a partial file may have been written
    Aborted,
}

/// Per-worksheet entry of a [`ConversionReport`].
#[derive(Debug, Clone, Serialize)]
pub struct SheetReport {
    pub sheet: String,
    pub title: Option<String>,
    pub part_path: String,
    pub status: SheetStatus,
    pub stats: SheetStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of converting one workbook file.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub sheets: Vec<SheetReport>,
}

impl ConversionReport {
    /// Paths of all files written.
    pub fn outputs(&self) -> Vec<&Path> {
        self.sheets
            .iter()
            .filter_map(|s| s.output.as_deref())
            .collect()
    }

    /// Total cells written across all worksheets.
    pub fn total_cells(&self) -> usize {
        self.sheets.iter().map(|s| s.stats.cells).sum()
    }

    /// Total cells skipped across all worksheets.
    pub fn total_skipped(&self) -> usize {
        self.sheets.iter().map(|s| s.stats.skipped).sum()
    }

    pub fn aborted_count(&self) -> usize {
        self.sheets
            .iter()
            .filter(|s| s.status == SheetStatus::Aborted)
            .count()
    }
}

/// Converts whole workbooks, one worksheet at a time.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    options: ExtractOptions,
}

impl Converter {
    /// Create a converter with the given options.
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract every worksheet, handing each outcome to `f` before the next
    /// worksheet is read. The first error from `f` stops the walk.
    pub fn for_each_sheet<E, F>(
        &self,
        workbook: &Workbook,
        sink: &mut dyn DiagnosticsSink,
        mut f: F,
    ) -> std::result::Result<(), E>
    where
        F: FnMut(&str, &WorksheetPart, SheetOutcome) -> std::result::Result<(), E>,
    {
        sink.report(Diagnostic::SheetsFound {
            count: workbook.sheet_count(),
        });

        let mut used = HashSet::new();
        for part in workbook.worksheets() {
            let name = sheet_label(part, self.options.sheet_naming, &mut used);
            log::debug!("extracting {} from {}", name, part.part_path);

            let outcome = workbook
                .with_sheet(part, |reader, shared| {
                    extract_sheet(reader, shared, &self.options, &name, &mut *sink)
                })
                .unwrap_or_else(|e| {
                    finish(
                        TableBuilder::new(),
                        0,
                        Some(StructuralError::new(0, e.to_string())),
                        &name,
                        sink,
                    )
                });

            f(&name, part, outcome)?;
        }
        Ok(())
    }

    /// Extract every worksheet into memory.
    pub fn extract_workbook(
        &self,
        workbook: &Workbook,
        sink: &mut dyn DiagnosticsSink,
    ) -> Vec<ExtractedSheet> {
        let mut sheets = Vec::with_capacity(workbook.sheet_count());
        let Ok(()) = self.for_each_sheet(workbook, sink, |name, part, outcome| {
            sheets.push(ExtractedSheet {
                name: name.to_string(),
                part: part.clone(),
                outcome,
            });
            Ok::<(), Infallible>(())
        });
        sheets
    }

    /// Convert a workbook file into `{base}_{sheet}.csv` files.
    ///
    /// Files go to `output_dir`, or next to the input when `None`.
    pub fn convert_file(
        &self,
        input: impl AsRef<Path>,
        output_dir: Option<&Path>,
        sink: &mut dyn DiagnosticsSink,
    ) -> Result<ConversionReport> {
        let input = input.as_ref();
        let workbook = Workbook::open(input)?;

        let base = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workbook".to_string());
        let dir = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        fs::create_dir_all(&dir)?;

        let mut sheets = Vec::new();
        self.for_each_sheet::<Error, _>(&workbook, sink, |name, part, outcome| {
            let write = !outcome.table().is_empty() || !self.options.skip_empty_sheets;
            let output = if write {
                let path = dir.join(format!("{}_{}.csv", base, name));
                let file = BufWriter::new(fs::File::create(&path)?);
                write_table(outcome.table(), file, &self.options.csv)?;
                log::debug!("wrote {}", path.display());
                Some(path)
            } else {
                None
            };

            let status = if outcome.is_aborted() {
                SheetStatus::Aborted
            } else if output.is_none() || outcome.table().is_empty() {
                SheetStatus::Empty
            } else {
                SheetStatus::Written
            };

            sheets.push(SheetReport {
                sheet: name.to_string(),
                title: part.title.clone(),
                part_path: part.part_path.clone(),
                status,
                stats: outcome.stats(),
                output,
                error: outcome.error().map(|e| e.to_string()),
            });
            Ok(())
        })?;

        Ok(ConversionReport {
            input: input.to_path_buf(),
            sheets,
        })
    }
}

/// Pick a unique, file-name-safe label for a worksheet.
fn sheet_label(part: &WorksheetPart, naming: SheetNaming, used: &mut HashSet<String>) -> String {
    let label = match (naming, part.title.as_deref()) {
        (SheetNaming::Title, Some(title)) => {
            let clean = sanitize_file_name(title);
            if clean.is_empty() {
                part.part_name.clone()
            } else if used.contains(&clean) {
                format!("{}_{}", clean, part.part_name)
            } else {
                clean
            }
        }
        _ => part.part_name.clone(),
    };
    used.insert(label.clone());
    label
}

/// Replace characters that are not allowed in file names.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    replaced.trim().trim_end_matches('.').trim_end().to_string()
}
