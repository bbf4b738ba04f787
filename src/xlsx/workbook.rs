//! Workbook-level parts: worksheet enumeration and the shared-string table.

use crate::container::SpreadsheetArchive;
use crate::detect::ensure_spreadsheet;
use crate::error::{Error, Result};
use std::io::BufRead;
use std::path::Path;

use super::shared_strings::SharedStrings;

const WORKBOOK_PATH: &str = "xl/workbook.xml";
const SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";
const WORKSHEET_PREFIX: &str = "xl/worksheets/";
const WORKSHEET_REL_SUFFIX: &str = "/worksheet";

/// One worksheet part inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorksheetPart {
    /// Tab title from `workbook.xml`, if the workbook part could be read
    pub title: Option<String>,
    /// Archive path, e.g. `xl/worksheets/sheet1.xml`
    pub part_path: String,
    /// Part file stem, e.g. `sheet1`
    pub part_name: String,
}

impl WorksheetPart {
    fn from_path(part_path: String, title: Option<String>) -> Self {
        let part_name = Path::new(&part_path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sheet".to_string());
        Self {
            title,
            part_path,
            part_name,
        }
    }

    /// Title if known, otherwise the part name.
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.part_name)
    }
}

/// Sheet entry from workbook.xml.
#[derive(Debug, Clone)]
struct SheetInfo {
    name: String,
    rel_id: String,
}

/// An opened workbook with its shared strings loaded and worksheets listed.
pub struct Workbook {
    archive: SpreadsheetArchive,
    shared_strings: SharedStrings,
    worksheets: Vec<WorksheetPart>,
}

impl Workbook {
    /// Open a workbook file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let archive = SpreadsheetArchive::open(path)?;
        Self::from_archive(archive)
    }

    /// Create a workbook from bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let archive = SpreadsheetArchive::from_bytes(data)?;
        Self::from_archive(archive)
    }

    /// Create a workbook from an archive.
    pub fn from_archive(archive: SpreadsheetArchive) -> Result<Self> {
        ensure_spreadsheet(&archive)?;

        let shared_strings = match archive.read_xml(SHARED_STRINGS_PATH) {
            Ok(xml) => SharedStrings::parse(&xml)?,
            Err(Error::MissingComponent(_)) => {
                log::debug!("no {} in archive, workbook has no text cells", SHARED_STRINGS_PATH);
                SharedStrings::default()
            }
            Err(e) => return Err(e),
        };

        let mut worksheets = Self::worksheets_from_workbook(&archive);
        if worksheets.is_empty() {
            worksheets = Self::worksheets_from_listing(&archive);
        }
        log::debug!(
            "found {} worksheet part(s), {} shared string(s)",
            worksheets.len(),
            shared_strings.len()
        );

        Ok(Self {
            archive,
            shared_strings,
            worksheets,
        })
    }

    /// Worksheets in tab order. Empty when `workbook.xml` or its
    /// relationships are missing or unreadable.
    fn worksheets_from_workbook(archive: &SpreadsheetArchive) -> Vec<WorksheetPart> {
        let sheets = match archive
            .read_xml(WORKBOOK_PATH)
            .and_then(|xml| parse_sheet_entries(&xml))
        {
            Ok(sheets) => sheets,
            Err(Error::MissingComponent(_)) => {
                log::debug!("no {}, falling back to part listing", WORKBOOK_PATH);
                return Vec::new();
            }
            Err(e) => {
                log::warn!("unreadable {}, falling back to part listing: {}", WORKBOOK_PATH, e);
                return Vec::new();
            }
        };
        let rels = match archive.read_relationships(WORKBOOK_PATH) {
            Ok(rels) => rels,
            Err(e) => {
                log::warn!(
                    "unreadable relationships of {}, falling back to part listing: {}",
                    WORKBOOK_PATH,
                    e
                );
                return Vec::new();
            }
        };

        let mut parts = Vec::new();
        for sheet in sheets {
            let Some(rel) = rels.get(&sheet.rel_id) else {
                log::warn!("sheet '{}' has no relationship '{}'", sheet.name, sheet.rel_id);
                continue;
            };
            if !rel.rel_type.ends_with(WORKSHEET_REL_SUFFIX) {
                log::debug!("sheet '{}' is not a worksheet ({})", sheet.name, rel.rel_type);
                continue;
            }

            let path = SpreadsheetArchive::resolve_path(WORKBOOK_PATH, &rel.target);
            if !archive.exists(&path) {
                log::warn!("sheet '{}' points at missing part {}", sheet.name, path);
                continue;
            }
            parts.push(WorksheetPart::from_path(path, Some(sheet.name)));
        }

        parts
    }

    /// Every `xl/worksheets/sheetN.xml`, ordered by `N`.
    fn worksheets_from_listing(archive: &SpreadsheetArchive) -> Vec<WorksheetPart> {
        let mut paths: Vec<String> = archive
            .list_files_with_prefix(WORKSHEET_PREFIX)
            .into_iter()
            .filter(|p| {
                let name = &p[WORKSHEET_PREFIX.len()..];
                name.starts_with("sheet") && name.ends_with(".xml") && !name.contains('/')
            })
            .collect();
        paths.sort_by_key(|p| (sheet_number(p), p.clone()));

        paths
            .into_iter()
            .map(|p| WorksheetPart::from_path(p, None))
            .collect()
    }

    /// Get the worksheets in processing order.
    pub fn worksheets(&self) -> &[WorksheetPart] {
        &self.worksheets
    }

    /// Get the number of worksheets.
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Get the shared-string table.
    pub fn shared_strings(&self) -> &SharedStrings {
        &self.shared_strings
    }

    /// Get a reference to the archive.
    pub fn archive(&self) -> &SpreadsheetArchive {
        &self.archive
    }

    /// Stream a worksheet's XML through `f`.
    pub fn with_sheet<T>(
        &self,
        part: &WorksheetPart,
        f: impl FnOnce(&mut dyn BufRead, &SharedStrings) -> T,
    ) -> Result<T> {
        self.archive
            .with_part(&part.part_path, |reader| f(reader, &self.shared_strings))
    }
}

impl std::fmt::Debug for Workbook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbook")
            .field("worksheets", &self.worksheets)
            .field("shared_strings", &self.shared_strings.len())
            .finish()
    }
}

/// Parse workbook.xml for sheet titles and relationship ids.
fn parse_sheet_entries(xml: &str) -> Result<Vec<SheetInfo>> {
    let mut sheets = Vec::new();
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Empty(e)) | Ok(quick_xml::events::Event::Start(e))
                if e.local_name().as_ref() == b"sheet" =>
            {
                let mut name = String::new();
                let mut rel_id = String::new();

                for attr in e.attributes().flatten() {
                    match attr.key.local_name().as_ref() {
                        b"name" => name = attr.unescape_value()?.into_owned(),
                        b"id" => rel_id = String::from_utf8_lossy(&attr.value).into_owned(),
                        _ => {}
                    }
                }

                if !name.is_empty() {
                    sheets.push(SheetInfo { name, rel_id });
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(Error::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// Numeric suffix of `.../sheetN.xml`; parts without one sort last.
fn sheet_number(path: &str) -> u64 {
    Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix("sheet"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(u64::MAX)
}
