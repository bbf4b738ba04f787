//! XLSX shared strings parsing.

use crate::error::{Error, Result};
use quick_xml::events::Event;

/// Shared strings table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedStrings {
    /// All strings in order
    strings: Vec<String>,
}

impl SharedStrings {
    /// Parse shared strings from XML content.
    ///
    /// Rich-text runs are concatenated; phonetic guides (`rPh`) are dropped.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut strings = Vec::new();
        let mut reader = quick_xml::Reader::from_str(xml);

        let mut buf = Vec::new();
        let mut in_si = false;
        let mut in_t = false;
        let mut phonetic_depth = 0usize;
        let mut current_text = String::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current_text.clear();
                    }
                    b"rPh" if in_si => phonetic_depth += 1,
                    b"t" if in_si && phonetic_depth == 0 => in_t = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => {
                    strings.push(String::new());
                }
                Ok(Event::Text(e)) if in_t => {
                    let text = e.unescape()?;
                    current_text.push_str(&text);
                }
                Ok(Event::CData(e)) if in_t => {
                    current_text.push_str(&String::from_utf8_lossy(&e));
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"si" => {
                        strings.push(std::mem::take(&mut current_text));
                        in_si = false;
                    }
                    b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::XmlParse(e.to_string())),
                _ => {}
            }
            buf.clear();
        }

        Ok(Self { strings })
    }

    /// Get a string by index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(|s| s.as_str())
    }

    /// Get the count of shared strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for SharedStrings {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            strings: iter.into_iter().map(Into::into).collect(),
        }
    }
}
