use picsheet_core::reader::package::Package;
use picsheet_core::reader::parser_utils::parse_cell_ref;
use picsheet_core::reader::{CellValue, SheetData};
use picsheet_core::{
    NoProgress, PicsheetConfig, PictureItem, PictureSheet, SheetError, SheetKind, WorkbookSession,
    WorkspaceInfo, read_picture_items, read_workbook_info, update_picture_items,
};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

enum MockValue {
    Text(String),
    Number(f64),
}

/// Worksheet contents for `create_mock_xlsx`
struct MockSheet {
    name: String,
    cells: Vec<(String, MockValue, Option<u32>)>,
    links: Vec<(String, String)>,
}

impl MockSheet {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: Vec::new(),
            links: Vec::new(),
        }
    }

    fn text(mut self, cell: &str, text: &str) -> Self {
        self.cells
            .push((cell.to_string(), MockValue::Text(text.to_string()), None));
        self
    }

    fn styled(mut self, cell: &str, text: &str, style: u32) -> Self {
        self.cells
            .push((cell.to_string(), MockValue::Text(text.to_string()), Some(style)));
        self
    }

    fn number(mut self, cell: &str, n: f64) -> Self {
        self.cells.push((cell.to_string(), MockValue::Number(n), None));
        self
    }

    fn link(mut self, cell: &str, target: &str) -> Self {
        self.links.push((cell.to_string(), target.to_string()));
        self
    }
}

// Styles with two cell formats; the second wraps text
const MOCK_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0" applyAlignment="1"><alignment wrapText="1"/></xf></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

// Helper to create a small but complete XLSX file for testing
fn create_mock_xlsx(path: &Path, sheets: &[MockSheet], with_styles: bool) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut shared: Vec<String> = Vec::new();
    let mut sheet_xml = Vec::new();
    for sheet in sheets {
        sheet_xml.push(worksheet_xml(sheet, &mut shared));
    }

    // 1. [Content_Types].xml
    zip.start_file("[Content_Types].xml", options)?;
    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#,
    );
    if with_styles {
        content_types.push_str(r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#);
    }
    for i in 0..sheets.len() {
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            i + 1
        ));
    }
    content_types.push_str("</Types>");
    zip.write_all(content_types.as_bytes())?;

    // 2. _rels/.rels
    zip.start_file("_rels/.rels", options)?;
    zip.write_all(format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_BASE}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#).as_bytes())?;

    // 3. xl/workbook.xml
    zip.start_file("xl/workbook.xml", options)?;
    let mut workbook_xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{NS_MAIN}" xmlns:r="{NS_REL}"><sheets>"#
    );
    for (i, sheet) in sheets.iter().enumerate() {
        workbook_xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            sheet.name,
            i + 1,
            i + 1
        ));
    }
    workbook_xml.push_str("</sheets></workbook>");
    zip.write_all(workbook_xml.as_bytes())?;

    // 4. xl/_rels/workbook.xml.rels
    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    let mut rels_xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for i in 0..sheets.len() {
        rels_xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{REL_BASE}/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            i + 1,
            i + 1
        ));
    }
    let next = sheets.len() + 1;
    rels_xml.push_str(&format!(
        r#"<Relationship Id="rId{next}" Type="{REL_BASE}/sharedStrings" Target="sharedStrings.xml"/>"#
    ));
    if with_styles {
        rels_xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{REL_BASE}/styles" Target="styles.xml"/>"#,
            next + 1
        ));
    }
    rels_xml.push_str("</Relationships>");
    zip.write_all(rels_xml.as_bytes())?;

    // 5. shared strings and styles
    zip.start_file("xl/sharedStrings.xml", options)?;
    let mut sst = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="{NS_MAIN}" count="{0}" uniqueCount="{0}">"#,
        shared.len()
    );
    for s in &shared {
        sst.push_str(&format!("<si><t>{s}</t></si>"));
    }
    sst.push_str("</sst>");
    zip.write_all(sst.as_bytes())?;

    if with_styles {
        zip.start_file("xl/styles.xml", options)?;
        zip.write_all(MOCK_STYLES.as_bytes())?;
    }

    // 6. sheets and their hyperlink relationships
    for (i, (sheet, xml)) in sheets.iter().zip(&sheet_xml).enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)?;
        zip.write_all(xml.as_bytes())?;

        if !sheet.links.is_empty() {
            zip.start_file(format!("xl/worksheets/_rels/sheet{}.xml.rels", i + 1), options)?;
            let mut rels = String::from(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            );
            for (j, (_, target)) in sheet.links.iter().enumerate() {
                rels.push_str(&format!(
                    r#"<Relationship Id="rId{}" Type="{REL_BASE}/hyperlink" Target="{}" TargetMode="External"/>"#,
                    j + 1,
                    target.replace('&', "&amp;")
                ));
            }
            rels.push_str("</Relationships>");
            zip.write_all(rels.as_bytes())?;
        }
    }

    zip.finish()?;
    Ok(())
}

fn worksheet_xml(sheet: &MockSheet, shared: &mut Vec<String>) -> String {
    let mut rows: BTreeMap<u32, BTreeMap<u32, String>> = BTreeMap::new();
    for (cell, value, style) in &sheet.cells {
        let (row, col) = parse_cell_ref(cell).expect("valid cell reference");
        let s = style.map(|s| format!(r#" s="{s}""#)).unwrap_or_default();
        let xml = match value {
            MockValue::Text(text) => {
                shared.push(text.clone());
                format!(r#"<c r="{cell}"{s} t="s"><v>{}</v></c>"#, shared.len() - 1)
            }
            MockValue::Number(n) => format!(r#"<c r="{cell}"{s}><v>{n}</v></c>"#),
        };
        rows.entry(row).or_default().insert(col, xml);
    }

    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="{NS_MAIN}" xmlns:r="{NS_REL}"><sheetViews><sheetView workbookViewId="0"/></sheetViews><sheetFormatPr defaultRowHeight="15"/><sheetData>"#
    );
    for (row, cells) in &rows {
        xml.push_str(&format!(r#"<row r="{}">"#, row + 1));
        for cell in cells.values() {
            xml.push_str(cell);
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData>");

    if !sheet.links.is_empty() {
        xml.push_str("<hyperlinks>");
        for (j, (cell, _)) in sheet.links.iter().enumerate() {
            xml.push_str(&format!(r#"<hyperlink ref="{cell}" r:id="rId{}"/>"#, j + 1));
        }
        xml.push_str("</hyperlinks>");
    }
    xml.push_str(r#"<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#);
    xml
}

/// Picture table in A2:B4 with a header row and a notes column
fn pictures_sheet() -> MockSheet {
    MockSheet::new("Pictures")
        .text("A1", "Name")
        .text("B1", "Link")
        .text("C1", "Notes")
        .text("A2", "cat.jpg")
        .text("B2", "https://example.com/cat.jpg")
        .text("A3", "dog.jpg")
        .text("B3", "Photo")
        .link("B3", "https://example.com/dog.jpg?size=large&v=2")
        .number("A4", 1001.0)
        .text("B4", " ftp://files.example.com/1001.png ")
        .text("C4", "numbered")
}

fn workspace_for(path: &Path, rows: (u32, u32)) -> WorkspaceInfo {
    WorkspaceInfo {
        workbook: read_workbook_info(path).unwrap(),
        selected_sheet_index: 1,
        row_begin: rows.0,
        row_end: rows.1,
        column_picture_names: "A".to_string(),
        column_picture_hyperlinks: "B".to_string(),
    }
}

fn load_first_sheet(path: &Path) -> SheetData {
    let session = WorkbookSession::open(path).unwrap();
    session.load_sheet(1).unwrap().1
}

fn read_part(path: &Path, name: &str) -> String {
    Package::open(path).unwrap().require_string(name).unwrap()
}

fn sheet_error(err: anyhow::Error) -> SheetError {
    match err.downcast::<SheetError>() {
        Ok(e) => e,
        Err(other) => panic!("unexpected error: {other:#}"),
    }
}

#[test]
fn test_read_workbook_info() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("info.xlsx");
    create_mock_xlsx(&path, &[pictures_sheet(), MockSheet::new("Empty")], true)?;

    let info = read_workbook_info(&path)?;
    assert_eq!(info.path, path);
    assert_eq!(info.sheet_names(), ["Pictures", "Empty"]);

    let pictures = info.sheet(1).unwrap();
    assert_eq!(pictures.kind, SheetKind::Worksheet);
    assert_eq!((pictures.last_cell.row, pictures.last_cell.column), (4, 3));

    let empty = info.get_sheet("Empty").unwrap();
    assert_eq!(empty.index, 2);
    assert_eq!((empty.last_cell.row, empty.last_cell.column), (1, 1));
    Ok(())
}

#[test]
fn test_read_picture_items() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("read.xlsx");
    create_mock_xlsx(&path, &[pictures_sheet()], true)?;
    let before = fs::read(&path)?;

    let workspace = workspace_for(&path, (2, 4));
    let mut reports: Vec<u8> = Vec::new();
    let mut progress = |percent: u8, _status: &str| reports.push(percent);
    let items = read_picture_items(&workspace, &mut progress)?;

    assert_eq!(
        items,
        [
            PictureItem::new("cat.jpg", Some("https://example.com/cat.jpg".into())),
            PictureItem::new("dog.jpg", Some("https://example.com/dog.jpg?size=large&v=2".into())),
            PictureItem::new("1001", Some("ftp://files.example.com/1001.png".into())),
        ]
    );
    assert_eq!(reports.first(), Some(&0));
    assert_eq!(reports.last(), Some(&100));
    assert!(reports.windows(2).all(|w| w[0] <= w[1]));

    // valid data is never written back
    assert_eq!(fs::read(&path)?, before);
    Ok(())
}

#[test]
fn test_invalid_rows_are_highlighted_and_saved() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("invalid.xlsx");
    let sheet = MockSheet::new("Pictures")
        .text("A1", "Name")
        .text("B1", "Link")
        .text("B2", "https://example.com/no-name.jpg")
        .text("A3", "dog.jpg")
        .styled("B3", "not a link", 1)
        .text("A4", "bird.jpg")
        .text("B4", "https://example.com/bird.jpg");
    create_mock_xlsx(&path, &[sheet], true)?;

    let workspace = workspace_for(&path, (2, 5));
    let err = read_picture_items(&workspace, &mut NoProgress).unwrap_err();
    let SheetError::InvalidData { cells } = sheet_error(err) else {
        panic!("expected invalid data");
    };
    assert_eq!(cells, ["A2", "B3", "A5", "B5"]);

    let data = load_first_sheet(&path);
    // cellXfs had 2 entries; source formats 0 and 1 get clones 2 and 3
    assert_eq!(data.style(1, 0), Some(2));
    assert_eq!(data.style(2, 1), Some(3));
    assert_eq!(data.style(4, 0), Some(2));
    assert_eq!(data.style(4, 1), Some(2));
    assert_eq!(data.style(3, 0), None);
    assert_eq!(
        data.value(2, 1),
        &CellValue::Text("not a link".to_string())
    );

    let styles = read_part(&path, "xl/styles.xml");
    assert!(styles.contains(r#"<fills count="3">"#));
    assert!(styles.contains(r#"<fgColor rgb="FFFF0000"/>"#));
    assert!(styles.contains(r#"<cellXfs count="4">"#));
    assert!(styles.contains(r#"applyAlignment="1" fillId="2" applyFill="1"><alignment wrapText="1"/></xf>"#));

    // marks are not cleared, so a second read fails the same way
    let err = read_picture_items(&workspace, &mut NoProgress).unwrap_err();
    assert!(matches!(sheet_error(err), SheetError::InvalidData { .. }));
    Ok(())
}

#[test]
fn test_highlight_without_styles_part() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nostyles.xlsx");
    let sheet = MockSheet::new("Pictures")
        .text("A1", "cat.jpg")
        .text("B1", "cat");
    create_mock_xlsx(&path, &[sheet], false)?;

    let workspace = workspace_for(&path, (1, 1));
    let err = read_picture_items(&workspace, &mut NoProgress).unwrap_err();
    assert!(matches!(sheet_error(err), SheetError::InvalidData { .. }));

    assert!(read_part(&path, "xl/styles.xml").contains(r#"<cellXfs count="2">"#));
    assert!(read_part(&path, "xl/_rels/workbook.xml.rels").contains("relationships/styles"));
    assert!(read_part(&path, "[Content_Types].xml").contains(r#"PartName="/xl/styles.xml""#));
    assert_eq!(load_first_sheet(&path).style(0, 1), Some(1));
    Ok(())
}

#[test]
fn test_update_picture_items() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("update.xlsx");
    create_mock_xlsx(&path, &[pictures_sheet()], true)?;
    let workspace = workspace_for(&path, (2, 4));

    let mut cat = PictureItem::new("cat.jpg", None);
    cat.mark_uploaded("https://cdn.example.com/p/1");
    let mut dog = PictureItem::new("dog.jpg", None);
    dog.mark_failed("timeout");
    let mut number = PictureItem::new("1001", None);
    number.mark_uploaded("https://cdn.example.com/p/2?a=1&b=2");
    let decoy = PictureItem::new("cat.jpg", Some("ignored".into()));

    let mut reports: Vec<u8> = Vec::new();
    let mut progress = |percent: u8, _status: &str| reports.push(percent);
    update_picture_items(&[cat, dog, number, decoy], &workspace, &mut progress)?;
    assert_eq!(reports.first(), Some(&0));
    assert_eq!(reports.last(), Some(&100));

    // last used column was C, results go to D
    let data = load_first_sheet(&path);
    assert_eq!(data.value(1, 3), &CellValue::Text("Photo".into()));
    assert_eq!(data.value(2, 3), &CellValue::Text("timeout".into()));
    assert_eq!(data.value(3, 3), &CellValue::Text("Photo".into()));
    assert_eq!(data.value(0, 3), &CellValue::Empty);

    let target = |row, col| {
        data.hyperlinks
            .iter()
            .find(|h| h.is_anchored_on(row, col))
            .and_then(|h| h.target.clone())
    };
    assert_eq!(target(1, 3).as_deref(), Some("https://cdn.example.com/p/1"));
    assert_eq!(target(2, 3), None);
    assert_eq!(target(3, 3).as_deref(), Some("https://cdn.example.com/p/2?a=1&b=2"));
    // source hyperlink is untouched
    assert_eq!(target(2, 1).as_deref(), Some("https://example.com/dog.jpg?size=large&v=2"));

    // existing cells keep their values, and the used area grows by one column
    assert_eq!(data.value(3, 2), &CellValue::Text("numbered".into()));
    let info = read_workbook_info(&path)?;
    assert_eq!(info.sheets[0].last_cell.column, 4);

    let sheet_xml = read_part(&path, "xl/worksheets/sheet1.xml");
    let hyperlinks = sheet_xml.find("<hyperlinks>").unwrap();
    assert!(hyperlinks < sheet_xml.find("<pageMargins").unwrap());
    Ok(())
}

#[test]
fn test_update_with_custom_link_text_to_other_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("source.xlsx");
    let output = dir.path().join("result.xlsx");
    let sheet = MockSheet::new("Pictures")
        .text("A1", "cat.jpg")
        .text("B1", "https://example.com/cat.jpg");
    create_mock_xlsx(&path, &[sheet], true)?;
    let before = fs::read(&path)?;

    let mut config = PicsheetConfig::default();
    config.output.link_text = "Image".into();
    let picsheet = PictureSheet::with_config(config);

    let workspace = workspace_for(&path, (1, 1));
    let mut cat = PictureItem::new("cat.jpg", None);
    cat.mark_uploaded("https://cdn.example.com/cat");
    picsheet.update_picture_items_as(&[cat], &workspace, &mut NoProgress, &output)?;

    assert_eq!(fs::read(&path)?, before);
    let data = load_first_sheet(&output);
    assert_eq!(data.value(0, 2), &CellValue::Text("Image".into()));
    assert!(
        read_part(&output, "xl/worksheets/_rels/sheet1.xml.rels")
            .contains(r#"Target="https://cdn.example.com/cat" TargetMode="External""#)
    );
    Ok(())
}

#[test]
fn test_repeated_update_replaces_previous_link() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("again.xlsx");
    let sheet = MockSheet::new("Pictures")
        .text("A1", "cat.jpg")
        .text("B1", "https://example.com/cat.jpg");
    create_mock_xlsx(&path, &[sheet], true)?;

    // the workspace snapshot is reused, so both runs target column C
    let workspace = workspace_for(&path, (1, 1));
    let mut cat = PictureItem::new("cat.jpg", None);
    cat.mark_uploaded("https://cdn.example.com/first");
    update_picture_items(&[cat.clone()], &workspace, &mut NoProgress)?;
    cat.mark_uploaded("https://cdn.example.com/second");
    update_picture_items(&[cat], &workspace, &mut NoProgress)?;

    let data = load_first_sheet(&path);
    let links: Vec<_> = data
        .hyperlinks
        .iter()
        .filter(|h| h.is_anchored_on(0, 2))
        .filter_map(|h| h.target.as_deref())
        .collect();
    assert_eq!(links, ["https://cdn.example.com/second"]);

    let rels = read_part(&path, "xl/worksheets/_rels/sheet1.xml.rels");
    assert!(!rels.contains("first"));
    Ok(())
}

#[test]
fn test_unknown_picture_leaves_file_untouched() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("unknown.xlsx");
    create_mock_xlsx(&path, &[pictures_sheet()], true)?;
    let before = fs::read(&path)?;
    let workspace = workspace_for(&path, (2, 4));

    let mut cat = PictureItem::new("cat.jpg", None);
    cat.mark_uploaded("https://cdn.example.com/p/1");
    let err = update_picture_items(&[cat], &workspace, &mut NoProgress).unwrap_err();
    match sheet_error(err) {
        SheetError::UnknownPicture { name, cell } => {
            assert_eq!(name, "dog.jpg");
            assert_eq!(cell, "A3");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fs::read(&path)?, before);

    // a blank name row fails the same way
    let workspace = workspace_for(&path, (2, 5));
    let items: Vec<_> = ["cat.jpg", "dog.jpg", "1001"]
        .iter()
        .map(|name| PictureItem::new(*name, None))
        .collect();
    let err = update_picture_items(&items, &workspace, &mut NoProgress).unwrap_err();
    assert!(matches!(
        sheet_error(err),
        SheetError::MissingPictureName { cell } if cell == "A5"
    ));
    assert_eq!(fs::read(&path)?, before);
    Ok(())
}

#[test]
fn test_unsupported_formats() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("list.csv");
    fs::write(&path, "name,link\n")?;

    let err = read_workbook_info(&path).unwrap_err();
    assert!(matches!(sheet_error(err), SheetError::UnsupportedFormat(_)));

    // legacy formats can be inspected but not written back
    let xlsx = dir.path().join("pictures.xlsx");
    create_mock_xlsx(&xlsx, &[pictures_sheet()], true)?;
    let mut workspace = workspace_for(&xlsx, (2, 4));
    workspace.workbook.path = dir.path().join("pictures.ods");

    let err = read_picture_items(&workspace, &mut NoProgress).unwrap_err();
    assert!(matches!(sheet_error(err), SheetError::UnsupportedFormat(_)));
    Ok(())
}

/// Minimal OpenDocument spreadsheet; each table is a list of rows of
/// `(value-type, value)` cells, `None` for an empty cell
fn create_mock_ods(path: &Path, tables: &[(&str, Vec<Vec<Option<(&str, &str)>>>)]) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    zip.start_file("mimetype", options)?;
    zip.write_all(b"application/vnd.oasis.opendocument.spreadsheet")?;

    zip.start_file("META-INF/manifest.xml", options)?;
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8"?><manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" manifest:version="1.2"><manifest:file-entry manifest:full-path="/" manifest:media-type="application/vnd.oasis.opendocument.spreadsheet"/><manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml"/></manifest:manifest>"#,
    )?;

    let mut content = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" office:version="1.2"><office:body><office:spreadsheet>"#,
    );
    for (name, rows) in tables {
        content.push_str(&format!(r#"<table:table table:name="{name}">"#));
        for row in rows {
            content.push_str("<table:table-row>");
            for cell in row {
                match cell {
                    Some(("string", text)) => content.push_str(&format!(
                        r#"<table:table-cell office:value-type="string"><text:p>{text}</text:p></table:table-cell>"#
                    )),
                    Some((kind, value)) => content.push_str(&format!(
                        r#"<table:table-cell office:value-type="{kind}" office:value="{value}"/>"#
                    )),
                    None => content.push_str("<table:table-cell/>"),
                }
            }
            content.push_str("</table:table-row>");
        }
        content.push_str("</table:table>");
    }
    content.push_str("</office:spreadsheet></office:body></office:document-content>");

    zip.start_file("content.xml", options)?;
    zip.write_all(content.as_bytes())?;
    zip.finish()?;
    Ok(())
}

#[test]
fn test_read_ods_workbook_info() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pictures.ods");
    create_mock_ods(
        &path,
        &[
            (
                "Pictures",
                vec![
                    vec![Some(("string", "Name")), Some(("string", "Link")), Some(("string", "Size"))],
                    vec![Some(("string", "cat.png")), Some(("string", "https://example.com/cat.png")), Some(("float", "12"))],
                ],
            ),
            ("Totals", vec![vec![None, Some(("float", "10"))]]),
        ],
    )?;

    let info = read_workbook_info(&path)?;
    assert_eq!(info.sheet_names(), ["Pictures", "Totals"]);

    let pictures = info.sheet(1).unwrap();
    assert_eq!(pictures.kind, SheetKind::Worksheet);
    assert_eq!((pictures.last_cell.row, pictures.last_cell.column), (2, 3));

    let totals = info.sheet(2).unwrap();
    assert_eq!(totals.name, "Totals");
    assert_eq!((totals.last_cell.row, totals.last_cell.column), (1, 2));
    Ok(())
}

#[test]
fn test_sessions_are_serialized() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let first = dir.path().join("first.xlsx");
    let second = dir.path().join("second.xlsx");
    create_mock_xlsx(&first, &[pictures_sheet()], true)?;
    create_mock_xlsx(&second, &[MockSheet::new("Other")], true)?;

    let session = WorkbookSession::open(&first)?;

    let (tx, rx) = std::sync::mpsc::channel();
    let waiter = std::thread::spawn(move || {
        let names = read_workbook_info(&second).map(|info| info.sheet_names().len());
        let _ = tx.send(names.is_ok());
    });

    assert!(
        rx.recv_timeout(Duration::from_millis(300)).is_err(),
        "second session opened while the first was live"
    );

    drop(session);
    assert!(rx.recv_timeout(Duration::from_secs(10))?);
    waiter.join().unwrap();
    Ok(())
}

#[test]
fn test_session_lock_recovers_after_panic() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("panic.xlsx");
    create_mock_xlsx(&path, &[pictures_sheet()], true)?;

    let panicking = path.clone();
    let result = std::thread::spawn(move || {
        let _session = WorkbookSession::open(&panicking).unwrap();
        panic!("failure while a session is open");
    })
    .join();
    assert!(result.is_err());

    let session = WorkbookSession::open(&path)?;
    assert_eq!(session.workbook_info()?.sheet_names(), ["Pictures"]);
    Ok(())
}

#[test]
fn test_invalid_output_config_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.xlsx");
    let sheet = MockSheet::new("Pictures")
        .text("A1", "cat.jpg")
        .text("A2", "dog.jpg");
    create_mock_xlsx(&path, &[sheet], true)?;
    let before = fs::read(&path)?;
    let workspace = workspace_for(&path, (1, 2));

    // would otherwise highlight B1:B2
    let mut config = PicsheetConfig::default();
    config.output.highlight_color = "red".into();
    let picsheet = PictureSheet::with_config(config);
    assert!(picsheet.read_picture_items(&workspace, &mut NoProgress).is_err());
    assert_eq!(fs::read(&path)?, before);

    let mut config = PicsheetConfig::default();
    config.output.link_text = String::new();
    let picsheet = PictureSheet::with_config(config);
    let mut cat = PictureItem::new("cat.jpg", None);
    cat.mark_uploaded("https://example.com/cat.jpg");
    let dog = PictureItem::new("dog.jpg", None);
    assert!(
        picsheet
            .update_picture_items(&[cat, dog], &workspace, &mut NoProgress)
            .is_err()
    );
    assert_eq!(fs::read(&path)?, before);
    Ok(())
}

#[test]
fn test_in_place_update_keeps_file_permissions() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("mode.xlsx");
    create_mock_xlsx(&path, &[pictures_sheet()], true)?;
    let mode = fs::metadata(&path)?.permissions();

    let workspace = workspace_for(&path, (2, 4));
    let items = read_picture_items(&workspace, &mut NoProgress)?;
    update_picture_items(&items, &workspace, &mut NoProgress)?;

    assert_eq!(fs::metadata(&path)?.permissions(), mode);
    Ok(())
}
