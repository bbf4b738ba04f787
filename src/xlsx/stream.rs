//! Streaming worksheet cell reader.
//!
//! Walks `sheetData` with a forward-only pull parser and yields one
//! [`CellEvent`] per cell that carries text. Self-closing `<c/>` elements and
//! cells without a `<v>` or `<is>` child never allocate anything, so a sheet
//! declaring millions of styled-but-empty cells costs only parsing time.

use crate::error::{Error, FormatError, Result, StructuralError};
use crate::model::{resolve_within, CellEvent, SheetLimits};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;

use super::shared_strings::SharedStrings;

/// How a cell's `<v>` text is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    /// `t="s"`: the value is an index into the shared-string table
    Shared,
    /// `t="inlineStr"`: the text lives in `<is>` runs
    Inline,
    /// Numbers, booleans, errors, formula strings: reproduced verbatim
    Verbatim,
}

/// Scratch state for the cell currently open. Reused across cells.
#[derive(Debug)]
struct OpenCell {
    active: bool,
    reference: String,
    kind: CellKind,
    value: String,
    has_content: bool,
    escape_error: Option<String>,
    in_value: bool,
    in_inline: bool,
    in_text: bool,
    phonetic_depth: usize,
}

impl OpenCell {
    fn new() -> Self {
        Self {
            active: false,
            reference: String::new(),
            kind: CellKind::Verbatim,
            value: String::new(),
            has_content: false,
            escape_error: None,
            in_value: false,
            in_inline: false,
            in_text: false,
            phonetic_depth: 0,
        }
    }

    fn begin(&mut self, start: &BytesStart<'_>) {
        self.active = true;
        self.reference.clear();
        self.kind = CellKind::Verbatim;
        self.value.clear();
        self.has_content = false;
        self.escape_error = None;
        self.in_value = false;
        self.in_inline = false;
        self.in_text = false;
        self.phonetic_depth = 0;

        for attr in start.attributes().flatten() {
            match attr.key.local_name().as_ref() {
                b"r" => self
                    .reference
                    .push_str(&String::from_utf8_lossy(&attr.value)),
                b"t" => {
                    self.kind = match attr.value.as_ref() {
                        b"s" => CellKind::Shared,
                        b"inlineStr" => CellKind::Inline,
                        _ => CellKind::Verbatim,
                    }
                }
                _ => {}
            }
        }
    }

    fn capturing(&self) -> bool {
        self.active && (self.in_value || self.in_text)
    }
}

/// Lazy sequence of cell events read from one worksheet part.
///
/// Items are `Err(Error::Format(_))` for cells that had content but could not
/// be interpreted; iteration may continue past those. An
/// `Err(Error::Structural(_))` is always the last item.
pub struct CellStream<'s, R: BufRead> {
    reader: Reader<R>,
    shared_strings: &'s SharedStrings,
    limits: SheetLimits,
    buf: Vec<u8>,
    depth: usize,
    in_sheet_data: bool,
    cell: OpenCell,
    finished: bool,
}

impl<'s, R: BufRead> CellStream<'s, R> {
    /// Start streaming cells from `source` using Excel's sheet limits.
    pub fn new(source: R, shared_strings: &'s SharedStrings) -> Self {
        Self::with_limits(source, shared_strings, SheetLimits::default())
    }

    /// Start streaming cells, skipping coordinates beyond `limits`.
    pub fn with_limits(source: R, shared_strings: &'s SharedStrings, limits: SheetLimits) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(false);

        Self {
            reader,
            shared_strings,
            limits,
            buf: Vec::new(),
            depth: 0,
            in_sheet_data: false,
            cell: OpenCell::new(),
            finished: false,
        }
    }

    /// Byte offset reached in the worksheet part.
    pub fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }
}

impl OpenCell {
    /// Turn the just-closed cell into an item, or `None` when it holds no text.
    fn close(
        &mut self,
        shared_strings: &SharedStrings,
        limits: SheetLimits,
    ) -> Option<Result<CellEvent>> {
        self.active = false;
        if !self.has_content {
            return None;
        }

        if let Some(detail) = self.escape_error.take() {
            return Some(Err(FormatError::Escape {
                reference: self.reference.clone(),
                detail,
            }
            .into()));
        }

        let value = match self.kind {
            CellKind::Shared => {
                let index = self.value.trim();
                if index.is_empty() {
                    return None;
                }
                match index.parse::<usize>().ok().and_then(|i| shared_strings.get(i)) {
                    Some(text) => text.to_string(),
                    None => {
                        return Some(Err(FormatError::SharedStringIndex {
                            reference: self.reference.clone(),
                            index: index.to_string(),
                        }
                        .into()))
                    }
                }
            }
            CellKind::Inline | CellKind::Verbatim => std::mem::take(&mut self.value),
        };

        if value.trim().is_empty() {
            return None;
        }
        if self.reference.is_empty() {
            return Some(Err(FormatError::MissingReference.into()));
        }

        Some(
            resolve_within(&self.reference, limits)
                .map(|address| CellEvent { address, value })
                .map_err(Error::from),
        )
    }
}

/// Mark the stream finished and build the terminal error.
fn abort(finished: &mut bool, position: u64, message: impl Into<String>) -> Error {
    *finished = true;
    Error::Structural(StructuralError::new(position, message))
}

impl<R: BufRead> Iterator for CellStream<'_, R> {
    type Item = Result<CellEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => {
                    let position = self.reader.buffer_position() as u64;
                    return Some(Err(abort(&mut self.finished, position, e.to_string())));
                }
            };

            match event {
                Event::Start(e) => {
                    self.depth += 1;
                    let cell = &mut self.cell;
                    match e.local_name().as_ref() {
                        b"sheetData" => self.in_sheet_data = true,
                        b"c" if self.in_sheet_data => cell.begin(&e),
                        b"v" if cell.active && !cell.in_inline => {
                            cell.in_value = true;
                            cell.has_content = true;
                        }
                        b"is" if cell.active => {
                            cell.in_inline = true;
                            cell.has_content = true;
                        }
                        b"rPh" if cell.in_inline => cell.phonetic_depth += 1,
                        b"t" if cell.in_inline && cell.phonetic_depth == 0 => {
                            cell.in_text = true;
                        }
                        _ => {}
                    }
                }
                Event::Text(e) if self.cell.capturing() => match e.unescape() {
                    Ok(text) => self.cell.value.push_str(&text),
                    Err(err) => {
                        if self.cell.escape_error.is_none() {
                            self.cell.escape_error = Some(err.to_string());
                        }
                    }
                },
                Event::CData(e) if self.cell.capturing() => {
                    self.cell.value.push_str(&String::from_utf8_lossy(&e));
                }
                Event::End(e) => {
                    if self.depth == 0 {
                        let position = self.reader.buffer_position() as u64;
                        return Some(Err(abort(
                            &mut self.finished,
                            position,
                            "closing tag without an open element",
                        )));
                    }
                    self.depth -= 1;

                    let cell = &mut self.cell;
                    match e.local_name().as_ref() {
                        b"sheetData" => self.in_sheet_data = false,
                        b"v" => cell.in_value = false,
                        b"t" => cell.in_text = false,
                        b"rPh" => cell.phonetic_depth = cell.phonetic_depth.saturating_sub(1),
                        b"is" => cell.in_inline = false,
                        b"c" if cell.active => {
                            if let Some(item) = cell.close(self.shared_strings, self.limits) {
                                return Some(item);
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => {
                    if self.depth > 0 {
                        let position = self.reader.buffer_position() as u64;
                        let message =
                            format!("document ends with {} unclosed element(s)", self.depth);
                        return Some(Err(abort(&mut self.finished, position, message)));
                    }
                    self.finished = true;
                    return None;
                }
                // Self-closing cells carry no content by construction.
                _ => {}
            }
        }
    }
}
