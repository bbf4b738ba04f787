//! Delimited-text serializer.
//!
//! Quoting follows RFC 4180 via the `csv` crate: a field is quoted when it
//! contains the delimiter, a quote or a line break, and embedded quotes are
//! doubled. A row holding a single empty field is written as `""` so that it
//! stays distinguishable from a blank line.

use crate::error::{Error, Result};
use crate::model::Table;
use std::io::Write;

use super::options::CsvOptions;

/// Lazily serialized lines of a table, one per row, without terminators.
///
/// Every row is produced, including rows where all fields are empty.
#[derive(Debug, Clone)]
pub struct CsvLines<'a> {
    rows: std::slice::Iter<'a, Vec<String>>,
    delimiter: u8,
}

impl Iterator for CsvLines<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(serialize_row(row, self.delimiter))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for CsvLines<'_> {}

/// Serialize a table with the default comma delimiter.
pub fn serialize(table: &Table) -> CsvLines<'_> {
    serialize_with(table, &CsvOptions::default())
}

/// Serialize a table with explicit options.
pub fn serialize_with<'a>(table: &'a Table, options: &CsvOptions) -> CsvLines<'a> {
    CsvLines {
        rows: table.rows.iter(),
        delimiter: options.delimiter,
    }
}

/// Write every serialized line of `table` to `writer`.
pub fn write_table<W: Write>(table: &Table, mut writer: W, options: &CsvOptions) -> Result<()> {
    let terminator = options.line_terminator.as_str();
    for line in serialize_with(table, options) {
        writer.write_all(line?.as_bytes())?;
        writer.write_all(terminator.as_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Convert a table to a single string with the configured terminators.
pub fn to_csv(table: &Table, options: &CsvOptions) -> Result<String> {
    let mut out = Vec::new();
    write_table(table, &mut out, options)?;
    String::from_utf8(out).map_err(|e| Error::Csv(e.to_string()))
}

fn serialize_row(row: &[String], delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());
    writer.write_record(row)?;

    let mut bytes = writer.into_inner().map_err(|e| Error::Csv(e.to_string()))?;
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    String::from_utf8(bytes).map_err(|e| Error::Csv(e.to_string()))
}
