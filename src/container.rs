//! ZIP container abstraction for spreadsheet archives.

use crate::error::{Error, Result};
use quick_xml::events::Event;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::Path;
use zip::result::ZipError;

/// One `<Relationship>` entry of a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    /// Type URI, e.g. `.../relationships/worksheet`
    pub rel_type: String,
    /// Target, relative to the source part unless it starts with `/`
    pub target: String,
}

/// Relationships of one part, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    by_id: HashMap<String, Relationship>,
}

impl Relationships {
    /// Parse the XML of a `.rels` part. Entries without an id are dropped.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut by_id = HashMap::new();
        let mut reader = quick_xml::Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                    let mut rel = Relationship {
                        id: String::new(),
                        rel_type: String::new(),
                        target: String::new(),
                    };
                    for attr in e.attributes().flatten() {
                        let value = attr.unescape_value()?.into_owned();
                        match attr.key.local_name().as_ref() {
                            b"Id" => rel.id = value,
                            b"Type" => rel.rel_type = value,
                            b"Target" => rel.target = value,
                            _ => {}
                        }
                    }
                    if !rel.id.is_empty() {
                        by_id.insert(rel.id.clone(), rel);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(Self { by_id })
    }

    /// Get a relationship by id.
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.by_id.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Byte-order mark found at the start of an XML part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bom {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl Bom {
    /// Detect a byte-order mark at the start of `head`.
    pub fn detect(head: &[u8]) -> Option<Self> {
        match head {
            [0xEF, 0xBB, 0xBF, ..] => Some(Bom::Utf8),
            [0xFF, 0xFE, ..] => Some(Bom::Utf16Le),
            [0xFE, 0xFF, ..] => Some(Bom::Utf16Be),
            _ => None,
        }
    }

    /// Length of the mark in bytes.
    pub fn byte_len(self) -> usize {
        match self {
            Bom::Utf8 => 3,
            Bom::Utf16Le | Bom::Utf16Be => 2,
        }
    }

    /// Whether the part must be transcoded before a UTF-8 parser can read it.
    pub fn is_utf16(self) -> bool {
        !matches!(self, Bom::Utf8)
    }
}

/// Rewrite a UTF-16 encoding declaration once the text has been transcoded,
/// otherwise quick-xml would try to decode the UTF-8 text as UTF-16 again.
fn fix_xml_encoding_declaration(content: String) -> String {
    let Some(end_decl) = content
        .strip_prefix("<?xml")
        .and_then(|rest| rest.find("?>"))
        .map(|pos| pos + "<?xml".len() + 2)
    else {
        return content;
    };

    let decl = &content[..end_decl];
    let lower = decl.to_ascii_lowercase();
    match lower.find("utf-16") {
        Some(pos) => format!(
            "{}UTF-8{}",
            &decl[..pos],
            &content[pos + "utf-16".len()..]
        ),
        None => content,
    }
}

/// Spreadsheet archive over a ZIP file.
///
/// Small auxiliary parts (workbook, relationships, shared strings) are read
/// whole; worksheet parts are streamed through [`SpreadsheetArchive::with_part`].
pub struct SpreadsheetArchive {
    archive: RefCell<zip::ZipArchive<Cursor<Vec<u8>>>>,
}

/// Decode XML bytes handling different encodings (UTF-8, UTF-16 LE/BE).
///
/// Parts are normally UTF-8, but some producers write UTF-16 with a BOM.
pub fn decode_xml_bytes(bytes: &[u8]) -> Result<String> {
    let invalid = |e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e));

    match Bom::detect(bytes) {
        Some(bom @ Bom::Utf8) => String::from_utf8(bytes[bom.byte_len()..].to_vec()).map_err(invalid),
        Some(bom @ Bom::Utf16Le) => {
            decode_utf16(&bytes[bom.byte_len()..], u16::from_le_bytes).map(fix_xml_encoding_declaration)
        }
        Some(bom @ Bom::Utf16Be) => {
            decode_utf16(&bytes[bom.byte_len()..], u16::from_be_bytes).map(fix_xml_encoding_declaration)
        }
        None => match String::from_utf8(bytes.to_vec()) {
            Ok(s) => Ok(s),
            // BOM-less UTF-16: ASCII markup leaves every other byte zero.
            Err(_) if bytes.len() >= 4 && bytes[1] == 0 && bytes[3] == 0 => {
                decode_utf16(bytes, u16::from_le_bytes)
            }
            Err(_) if bytes.len() >= 4 && bytes[0] == 0 && bytes[2] == 0 => {
                decode_utf16(bytes, u16::from_be_bytes)
            }
            Err(_) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        },
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String> {
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

impl SpreadsheetArchive {
    /// Open a spreadsheet archive from a file path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sheetrescue::container::SpreadsheetArchive;
    ///
    /// let archive = SpreadsheetArchive::open("bloated.xlsx")?;
    /// # Ok::<(), sheetrescue::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    /// Create a spreadsheet archive from a byte vector.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let cursor = Cursor::new(data);
        let archive = zip::ZipArchive::new(cursor)?;
        Ok(Self {
            archive: RefCell::new(archive),
        })
    }

    /// Read a whole XML part as a string, transcoding UTF-16 parts.
    pub fn read_xml(&self, path: &str) -> Result<String> {
        let bytes = self.with_part(path, |reader| {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes).map(|_| bytes)
        })??;
        decode_xml_bytes(&bytes)
    }

    /// Stream a part through `f` without reading it into memory first.
    ///
    /// The archive stays borrowed while `f` runs, so `f` must not call back
    /// into this archive.
    pub fn with_part<T>(&self, path: &str, f: impl FnOnce(&mut dyn BufRead) -> T) -> Result<T> {
        let mut archive = self.archive.borrow_mut();
        let file = archive
            .by_name(path)
            .map_err(|e| match e {
                ZipError::FileNotFound => Error::MissingComponent(path.to_string()),
                other => Error::from(other),
            })?;
        let mut reader = BufReader::new(file);
        Ok(f(&mut reader))
    }

    /// Check if a file exists in the archive.
    pub fn exists(&self, path: &str) -> bool {
        self.archive.borrow().file_names().any(|n| n == path)
    }

    /// List all files in the archive.
    pub fn list_files(&self) -> Vec<String> {
        let archive = self.archive.borrow();
        archive.file_names().map(String::from).collect()
    }

    /// List files matching a prefix.
    pub fn list_files_with_prefix(&self, prefix: &str) -> Vec<String> {
        let archive = self.archive.borrow();
        archive
            .file_names()
            .filter(|n| n.starts_with(prefix))
            .map(String::from)
            .collect()
    }

    /// Relationships of `part_path`. A part without a `.rels` file has none.
    pub fn read_relationships(&self, part_path: &str) -> Result<Relationships> {
        let rels_path = match part_path.rsplit_once('/') {
            Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
            None => format!("_rels/{}.rels", part_path),
        };

        match self.read_xml(&rels_path) {
            Ok(xml) => Relationships::parse(&xml),
            Err(Error::MissingComponent(_)) => Ok(Relationships::default()),
            Err(e) => Err(e),
        }
    }

    /// Resolve a relative path from a base path.
    pub fn resolve_path(base: &str, relative: &str) -> String {
        if let Some(stripped) = relative.strip_prefix('/') {
            return stripped.to_string();
        }

        let base_path = Path::new(base);
        let base_dir = base_path.parent().unwrap_or(Path::new(""));

        let mut result = base_dir.to_path_buf();
        for component in Path::new(relative).components() {
            match component {
                std::path::Component::ParentDir => {
                    result.pop();
                }
                std::path::Component::Normal(c) => {
                    result.push(c);
                }
                _ => {}
            }
        }

        result.to_string_lossy().replace('\\', "/")
    }
}

impl std::fmt::Debug for SpreadsheetArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpreadsheetArchive")
            .field("files", &self.list_files().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        assert_eq!(
            SpreadsheetArchive::resolve_path("xl/workbook.xml", "worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(
            SpreadsheetArchive::resolve_path("xl/workbook.xml", "/xl/worksheets/sheet2.xml"),
            "xl/worksheets/sheet2.xml"
        );
        assert_eq!(
            SpreadsheetArchive::resolve_path("xl/worksheets/sheet1.xml", "../sharedStrings.xml"),
            "xl/sharedStrings.xml"
        );
    }

    #[test]
    fn test_parse_relationships() {
        let rels = Relationships::parse(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://test/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Type="http://test/orphan" Target="orphan.xml"/>
<Relationship Id="rId2" Type="http://test/link" Target="a?b=1&amp;c=2"/>
</Relationships>"#,
        )
        .unwrap();

        assert_eq!(rels.get("rId1").unwrap().rel_type, "http://test/worksheet");
        assert_eq!(rels.get("rId2").unwrap().target, "a?b=1&c=2");
        assert!(rels.get("rId3").is_none());
        assert!(Relationships::parse("").unwrap().is_empty());
        assert!(Relationships::parse("<Relationships><Relationship Id=").is_err());
    }

    fn sample_archive() -> SpreadsheetArchive {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut buffer = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buffer));
            let options = SimpleFileOptions::default();
            zip.start_file("xl/workbook.xml", options).unwrap();
            zip.write_all(b"<workbook/>").unwrap();
            zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
            zip.write_all(b"<worksheet><sheetData/></worksheet>").unwrap();
            zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
            zip.write_all(
                br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId9" Type="http://example.com/link" Target="https://example.com" TargetMode="External"/>
</Relationships>"#,
            )
            .unwrap();
            zip.finish().unwrap();
        }
        SpreadsheetArchive::from_bytes(buffer).unwrap()
    }

    #[test]
    fn test_archive_listing() {
        let archive = sample_archive();
        assert!(archive.exists("xl/workbook.xml"));
        assert!(!archive.exists("xl/sharedStrings.xml"));
        assert_eq!(archive.list_files().len(), 3);
        assert_eq!(
            archive.list_files_with_prefix("xl/worksheets/"),
            vec!["xl/worksheets/sheet1.xml".to_string()]
        );
    }

    #[test]
    fn test_with_part_streams_content() {
        let archive = sample_archive();
        let text = archive
            .with_part("xl/worksheets/sheet1.xml", |reader| {
                let mut text = String::new();
                reader.read_to_string(&mut text).map(|_| text)
            })
            .unwrap()
            .unwrap();
        assert_eq!(text, "<worksheet><sheetData/></worksheet>");

        let missing = archive.with_part("xl/worksheets/sheet2.xml", |_| ());
        assert!(matches!(missing, Err(Error::MissingComponent(_))));
    }

    #[test]
    fn test_read_relationships() {
        let archive = sample_archive();
        let rels = archive.read_relationships("xl/workbook.xml").unwrap();
        assert_eq!(rels.get("rId1").unwrap().target, "worksheets/sheet1.xml");
        assert_eq!(rels.get("rId9").unwrap().target, "https://example.com");

        let none = archive.read_relationships("xl/worksheets/sheet1.xml").unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_utf16_decoding_function() {
        // UTF-16 LE with BOM
        let utf16_le = b"\xFF\xFE<\0?\0x\0m\0l\0>\0";
        let result = decode_xml_bytes(utf16_le).expect("Should decode UTF-16 LE");
        assert_eq!(result, "<?xml>");

        // UTF-16 BE with BOM
        let utf16_be = b"\xFE\xFF\0<\0?\0x\0m\0l\0>";
        let result = decode_xml_bytes(utf16_be).expect("Should decode UTF-16 BE");
        assert_eq!(result, "<?xml>");

        // UTF-8 BOM
        let utf8_bom = b"\xEF\xBB\xBF<?xml>";
        let result = decode_xml_bytes(utf8_bom).expect("Should decode UTF-8 with BOM");
        assert_eq!(result, "<?xml>");

        let utf16_decl = "\u{FEFF}<?xml version=\"1.0\" encoding=\"UTF-16\"?><a/>";
        let bytes: Vec<u8> = utf16_decl
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        let result = decode_xml_bytes(&bytes).expect("Should decode UTF-16 declaration");
        assert_eq!(result, "<?xml version=\"1.0\" encoding=\"UTF-8\"?><a/>");
    }

    #[test]
    fn test_bom_detection() {
        assert_eq!(Bom::detect(b"\xEF\xBB\xBF<a/>"), Some(Bom::Utf8));
        assert_eq!(Bom::detect(b"\xFF\xFE<\0"), Some(Bom::Utf16Le));
        assert_eq!(Bom::detect(b"\xFE\xFF\0<"), Some(Bom::Utf16Be));
        assert_eq!(Bom::detect(b"<a/>"), None);
        assert_eq!(Bom::detect(b""), None);
        assert!(Bom::Utf16Be.is_utf16());
        assert!(!Bom::Utf8.is_utf16());
    }

    #[test]
    fn test_invalid_zip() {
        let result = SpreadsheetArchive::from_bytes(b"not a zip".to_vec());
        assert!(matches!(result, Err(Error::ZipArchive(_))));
    }
}
