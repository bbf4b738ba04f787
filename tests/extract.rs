//! End-to-end extraction tests over synthetic workbooks.
//!
//! Run with: cargo test --test extract

use sheetrescue::model::column_name;
use sheetrescue::{
    CellAddress, Converter, Diagnostic, Error, ExtractOptions, FormatError, SheetNaming,
    SheetStatus, Workbook,
};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const WORKSHEET_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";

/// One worksheet of a synthetic workbook: tab title and sheetData body.
struct SheetDef<'a> {
    title: &'a str,
    rows: String,
}

fn sheet<'a>(title: &'a str, rows: impl Into<String>) -> SheetDef<'a> {
    SheetDef {
        title,
        rows: rows.into(),
    }
}

/// Build a minimal .xlsx archive with the given worksheets and shared strings.
fn build_xlsx(sheets: &[SheetDef<'_>], shared: &[&str]) -> Vec<u8> {
    let mut buffer = Vec::new();
    let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
</Types>"#,
    )
    .unwrap();

    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (i, def) in sheets.iter().enumerate() {
        let n = i + 1;
        workbook.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            def.title, n, n
        ));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{}" Target="worksheets/sheet{}.xml"/>"#,
            n, WORKSHEET_REL, n
        ));
    }
    workbook.push_str("</sheets></workbook>");
    rels.push_str("</Relationships>");

    zip.start_file("xl/workbook.xml", options).unwrap();
    zip.write_all(workbook.as_bytes()).unwrap();
    zip.start_file("xl/_rels/workbook.xml.rels", options)
        .unwrap();
    zip.write_all(rels.as_bytes()).unwrap();

    if !shared.is_empty() {
        let mut sst = String::from(
            r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        );
        for s in shared {
            sst.push_str(&format!("<si><t>{}</t></si>", s));
        }
        sst.push_str("</sst>");
        zip.start_file("xl/sharedStrings.xml", options).unwrap();
        zip.write_all(sst.as_bytes()).unwrap();
    }

    for (i, def) in sheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
            .unwrap();
        zip.write_all(
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        )
        .unwrap();
        zip.write_all(def.rows.as_bytes()).unwrap();
        if !def.rows.ends_with("<!--truncated-->") {
            zip.write_all(b"</sheetData></worksheet>").unwrap();
        }
    }

    zip.finish().unwrap();
    buffer
}

fn write_input(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).unwrap();
    path
}

/// A 1000x1000 grid of styled empty cells with two real values.
fn bloated_rows() -> String {
    let mut rows = String::with_capacity(24 * 1_000_000);
    for r in 1..=1000u32 {
        rows.push_str(&format!(r#"<row r="{}">"#, r));
        for c in 0..1000u32 {
            let reference = format!("{}{}", column_name(c), r);
            match (r, c) {
                (1, 0) => rows.push_str(r#"<c r="A1" s="1"><v></v></c>"#),
                (2, 1) => rows.push_str(r#"<c r="B2"><v>7</v></c>"#),
                (5, 3) => rows.push_str(r#"<c r="D5" t="s"><v>0</v></c>"#),
                _ => rows.push_str(&format!(r#"<c r="{}" s="1"/>"#, reference)),
            }
        }
        rows.push_str("</row>");
    }
    rows
}

#[test]
fn bloated_sheet_shrinks_to_bounding_box() {
    let data = build_xlsx(&[sheet("Sheet1", bloated_rows())], &["hello"]);
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "bloated.xlsx", &data);

    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let report = Converter::default()
        .convert_file(&input, None, &mut diagnostics)
        .unwrap();

    assert_eq!(report.sheets.len(), 1);
    let sheet = &report.sheets[0];
    assert_eq!(sheet.status, SheetStatus::Written);
    assert_eq!(sheet.stats.cells, 2);
    assert_eq!(sheet.stats.rows, 5);
    assert_eq!(sheet.stats.columns, 4);

    let output = dir.path().join("bloated_sheet1.csv");
    assert_eq!(sheet.output.as_deref(), Some(output.as_path()));
    let csv = fs::read_to_string(&output).unwrap();
    assert_eq!(csv, ",,,\r\n,7,,\r\n,,,\r\n,,,\r\n,,,hello\r\n");
}

#[test]
fn far_outlier_cell_does_not_inflate_table() {
    let rows = r#"<row r="1"><c r="A1"><v>kept</v></c></row>
<row r="1048576"><c r="XFD1048576"><v>junk</v></c></row>"#;
    let data = build_xlsx(&[sheet("Data", rows)], &[]);
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "outlier.xlsx", &data);

    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let report = Converter::default()
        .convert_file(&input, None, &mut diagnostics)
        .unwrap();

    let sheet = &report.sheets[0];
    assert_eq!(sheet.status, SheetStatus::Written);
    assert_eq!(sheet.stats.rows, 1);
    assert_eq!(sheet.stats.columns, 1);
    assert_eq!(sheet.stats.skipped, 1);
    assert_eq!(
        fs::read_to_string(dir.path().join("outlier_sheet1.csv")).unwrap(),
        "kept\r\n"
    );
    assert!(diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::CellSkipped {
            error: FormatError::OutOfRange { reference, .. },
            ..
        } if reference == "XFD1048576"
    )));
}

#[test]
fn unreadable_relationships_fall_back_to_part_listing() {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = SimpleFileOptions::default();
        zip.start_file("xl/workbook.xml", options).unwrap();
        zip.write_all(
            br#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Only" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        )
        .unwrap();
        zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
        zip.write_all(br#"<Relationships><Relationship Id="rId1" Target="works"#)
            .unwrap();
        for (name, value) in [("sheet2", "b"), ("sheet1", "a")] {
            zip.start_file(format!("xl/worksheets/{}.xml", name), options)
                .unwrap();
            zip.write_all(
                format!(
                    r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>{}</t></is></c></row></sheetData></worksheet>"#,
                    value
                )
                .as_bytes(),
            )
            .unwrap();
        }
        zip.finish().unwrap();
    }

    let workbook = Workbook::from_bytes(buffer).unwrap();
    let sheets = Converter::default().extract_workbook(&workbook, &mut Vec::<Diagnostic>::new());

    let names: Vec<&str> = sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["sheet1", "sheet2"]);
    assert_eq!(sheets[0].outcome.table().rows, vec![vec!["a"]]);
    assert_eq!(sheets[1].outcome.table().rows, vec![vec!["b"]]);
    assert!(sheets.iter().all(|s| s.part.title.is_none()));
}

#[test]
fn malformed_cell_is_skipped_and_reported() {
    let rows = r#"<row r="1"><c r="A1"><v>1</v></c><c r="B1"><v>2</v></c></row>
<row r="2"><c r="1A"><v>bad</v></c><c r="C2"><v>3</v></c></row>"#;
    let data = build_xlsx(&[sheet("Data", rows)], &[]);

    let workbook = Workbook::from_bytes(data).unwrap();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let sheets = Converter::default().extract_workbook(&workbook, &mut diagnostics);

    let table = sheets[0].outcome.table();
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.column_count(), 3);
    assert_eq!(table.get(CellAddress::new(1, 2)), Some("3"));
    assert_eq!(table.get(CellAddress::new(1, 0)), Some(""));
    assert_eq!(sheets[0].outcome.stats().skipped, 1);

    let skipped: Vec<&FormatError> = diagnostics
        .iter()
        .filter_map(|d| match d {
            Diagnostic::CellSkipped { error, .. } => Some(error),
            _ => None,
        })
        .collect();
    assert_eq!(skipped.len(), 1);
    assert!(matches!(skipped[0], FormatError::InvalidCharacter { .. }));
}

#[test]
fn broken_sheet_does_not_affect_others() {
    let data = build_xlsx(
        &[
            sheet("First", r#"<row r="1"><c r="A1"><v>a</v></c></row>"#),
            sheet(
                "Broken",
                r#"<row r="1"><c r="A1"><v>kept</v></c></row><row r="2"><c r="A2"><v>lo<!--truncated-->"#,
            ),
            sheet("Third", r#"<row r="3"><c r="C3"><v>c</v></c></row>"#),
        ],
        &[],
    );
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "mixed.xlsx", &data);
    let out = dir.path().join("out");

    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let report = Converter::default()
        .convert_file(&input, Some(&out), &mut diagnostics)
        .unwrap();

    let statuses: Vec<SheetStatus> = report.sheets.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![SheetStatus::Written, SheetStatus::Aborted, SheetStatus::Written]
    );
    assert_eq!(report.aborted_count(), 1);
    assert!(report.sheets[1].error.is_some());

    assert_eq!(fs::read_to_string(out.join("mixed_sheet1.csv")).unwrap(), "a\r\n");
    assert_eq!(fs::read_to_string(out.join("mixed_sheet2.csv")).unwrap(), "kept\r\n");
    assert_eq!(
        fs::read_to_string(out.join("mixed_sheet3.csv")).unwrap(),
        ",,\r\n,,\r\n,,c\r\n"
    );

    assert!(diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::SheetAborted { sheet, .. } if sheet == "sheet2")));
}

#[test]
fn empty_sheet_writes_no_file() {
    let data = build_xlsx(
        &[
            sheet("Blank", r#"<row r="1"><c r="A1" s="4"/><c r="B1" s="4"/></row>"#),
            sheet("Values", r#"<row r="1"><c r="A1" t="b"><v>1</v></c></row>"#),
        ],
        &[],
    );
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "book.xlsx", &data);

    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let report = Converter::default()
        .convert_file(&input, None, &mut diagnostics)
        .unwrap();

    assert_eq!(report.sheets[0].status, SheetStatus::Empty);
    assert!(report.sheets[0].output.is_none());
    assert!(!dir.path().join("book_sheet1.csv").exists());
    assert_eq!(report.outputs().len(), 1);
    assert!(diagnostics.contains(&Diagnostic::SheetEmpty {
        sheet: "sheet1".to_string()
    }));

    // Kept when asked to
    let keep = Converter::new(ExtractOptions::new().with_skip_empty_sheets(false));
    let report = keep.convert_file(&input, None, &mut Vec::<Diagnostic>::new()).unwrap();
    assert_eq!(report.sheets[0].status, SheetStatus::Empty);
    assert_eq!(
        fs::read_to_string(dir.path().join("book_sheet1.csv")).unwrap(),
        ""
    );
}

#[test]
fn titles_and_delimiter_options() {
    let data = build_xlsx(
        &[
            sheet("Q1/Q2", r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>2</v></c></row>"#),
            sheet("Q1/Q2", r#"<row r="1"><c r="A1" t="inlineStr"><is><t>x;y</t></is></c></row>"#),
        ],
        &["a b"],
    );
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "titled.xlsx", &data);

    let options = ExtractOptions::new()
        .with_delimiter(b';')
        .with_sheet_naming(SheetNaming::Title);
    let report = Converter::new(options)
        .convert_file(&input, None, &mut Vec::<Diagnostic>::new())
        .unwrap();

    assert_eq!(report.sheets[0].sheet, "Q1_Q2");
    assert_eq!(report.sheets[1].sheet, "Q1_Q2_sheet2");
    assert_eq!(report.sheets[0].title.as_deref(), Some("Q1/Q2"));
    assert_eq!(
        fs::read_to_string(dir.path().join("titled_Q1_Q2.csv")).unwrap(),
        "a b;2\r\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("titled_Q1_Q2_sheet2.csv")).unwrap(),
        "\"x;y\"\r\n"
    );
}

#[test]
fn report_serializes_to_json() {
    let data = build_xlsx(&[sheet("S", r#"<row r="1"><c r="A1"><v>1</v></c></row>"#)], &[]);
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "r.xlsx", &data);

    let report = Converter::default()
        .convert_file(&input, None, &mut Vec::<Diagnostic>::new())
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["sheets"][0]["sheet"], "sheet1");
    assert_eq!(json["sheets"][0]["status"], "written");
    assert_eq!(json["sheets"][0]["stats"]["cells"], 1);
    assert!(json["sheets"][0].get("error").is_none());
}

#[test]
fn non_spreadsheet_archive_is_rejected() {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<w:document/>").unwrap();
        zip.finish().unwrap();
    }
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "doc.xlsx", &buffer);

    let result = Converter::default().convert_file(&input, None, &mut Vec::<Diagnostic>::new());
    assert!(matches!(result, Err(Error::NotSpreadsheet(_))));
    assert!(!sheetrescue::is_spreadsheet(&buffer));
}
