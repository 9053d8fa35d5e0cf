//! XML parsing of the SpreadsheetML parts we need: workbook, relationships,
//! shared strings and worksheets

use anyhow::{Context, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;

use super::package::Package;
use super::parser_utils::{
    attribute, parse_cell_range, parse_cell_ref, read_text_node, rels_path_for, resolve_part_path,
};
use super::workbook::{Cell, CellValue, Hyperlink, SheetData, SheetKind};

pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const REL_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
pub const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub const NS_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

/// A `<Relationship>` of a `.rels` part
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

/// A `<sheet>` entry of the workbook part, resolved to its part path
#[derive(Debug, Clone)]
pub struct SheetEntry {
    pub name: String,
    /// 1-based position in the workbook
    pub index: u32,
    pub part_path: String,
    pub kind: SheetKind,
}

/// Parse the relationships of `part`; a missing `.rels` part means no relationships
pub fn read_relationships(package: &Package, part: &str) -> Result<Vec<Relationship>> {
    let rels_path = if part.is_empty() {
        "_rels/.rels".to_string()
    } else {
        rels_path_for(part)
    };
    match package.read_string(&rels_path)? {
        Some(xml) => parse_relationships(&xml).with_context(|| format!("Failed to parse {rels_path}")),
        None => Ok(Vec::new()),
    }
}

pub fn parse_relationships(xml: &str) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut rels = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut rel = Relationship {
                    id: String::new(),
                    rel_type: String::new(),
                    target: String::new(),
                    external: false,
                };
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => rel.id = attr.unescape_value()?.into_owned(),
                        b"Type" => rel.rel_type = attr.unescape_value()?.into_owned(),
                        b"Target" => rel.target = attr.unescape_value()?.into_owned(),
                        b"TargetMode" => rel.external = attr.unescape_value()? == "External",
                        _ => {}
                    }
                }
                rels.push(rel);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rels)
}

/// Locate the workbook part through the package relationships
pub fn workbook_part_path(package: &Package) -> Result<String> {
    let rels = read_relationships(package, "")?;
    let path = rels
        .iter()
        .find(|r| r.rel_type == REL_OFFICE_DOCUMENT || r.rel_type.ends_with("/officeDocument"))
        .map(|r| resolve_part_path("", &r.target))
        .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string());
    log::debug!("Workbook part: {}", path);
    Ok(path)
}

/// List the sheets of the workbook in their tab order
pub fn read_sheet_entries(package: &Package, workbook_part: &str) -> Result<Vec<SheetEntry>> {
    let workbook_xml = package.require_string(workbook_part)?;
    let rels = read_relationships(package, workbook_part)?;
    let targets: HashMap<&str, &Relationship> = rels.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut reader = Reader::from_str(&workbook_xml);
    reader.config_mut().trim_text(true);
    let mut entries = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let mut name = String::new();
                let mut r_id = String::new();
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"name" {
                        name = attr.unescape_value()?.into_owned();
                    } else if attr.key.local_name().as_ref() == b"id" && attr.key.prefix().is_some() {
                        r_id = attr.unescape_value()?.into_owned();
                    }
                }

                let rel = targets.get(r_id.as_str()).ok_or_else(|| {
                    anyhow::anyhow!("Relationship '{}' not found for sheet '{}'", r_id, name)
                })?;
                let kind = if rel.rel_type.ends_with("/chartsheet") {
                    SheetKind::Chartsheet
                } else {
                    SheetKind::Worksheet
                };

                entries.push(SheetEntry {
                    name,
                    index: entries.len() as u32 + 1,
                    part_path: resolve_part_path(workbook_part, &rel.target),
                    kind,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

/// Path of a workbook-level part identified by relationship type suffix
pub fn workbook_related_part(
    package: &Package,
    workbook_part: &str,
    type_suffix: &str,
) -> Result<Option<String>> {
    let rels = read_relationships(package, workbook_part)?;
    Ok(rels
        .iter()
        .find(|r| r.rel_type.ends_with(type_suffix))
        .map(|r| resolve_part_path(workbook_part, &r.target)))
}

pub fn read_shared_strings(package: &Package, workbook_part: &str) -> Result<Vec<String>> {
    let path = workbook_related_part(package, workbook_part, "/sharedStrings")?
        .unwrap_or_else(|| "xl/sharedStrings.xml".to_string());
    match package.read_string(&path)? {
        Some(xml) => parse_shared_strings(&xml),
        None => Ok(Vec::new()),
    }
}

pub fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    // Phonetic runs (<rPh>) are not part of the visible text
    let mut in_phonetic = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"rPh" => in_phonetic = true,
                b"t" if !in_phonetic => current.push_str(&read_text_node(&mut reader)?),
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(e) => match e.local_name().as_ref() {
                b"rPh" => in_phonetic = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(strings)
}

/// Parse a worksheet part into cells and hyperlinks.
///
/// `rels` are the relationships of the worksheet part, used to resolve
/// hyperlink targets.
pub fn parse_sheet(xml: &str, shared_strings: &[String], rels: &[Relationship]) -> Result<SheetData> {
    let mut reader = Reader::from_str(xml);
    let mut data = SheetData::default();
    let mut current_row = 0u32;
    let mut current_col = 0u32;
    let mut seen_row = false;
    let mut in_sheet_data = false;

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"sheetData" => in_sheet_data = matches!(event, Event::Start(_)),
                b"row" if in_sheet_data => {
                    current_row = match attribute(e, b"r")? {
                        Some(r) => r.parse::<u32>()?.saturating_sub(1),
                        None if seen_row => current_row + 1,
                        None => 0,
                    };
                    seen_row = true;
                    current_col = 0;
                }
                b"c" if in_sheet_data => {
                    let (row, col, t_attr, style) = cell_position(e, current_row, current_col)?;
                    current_col = col + 1;

                    let value = if matches!(event, Event::Start(_)) {
                        parse_cell_contents(&mut reader, &t_attr, shared_strings)?
                    } else {
                        CellValue::Empty
                    };

                    let (max_row, max_col) = data.max_cell.unwrap_or((0, 0));
                    data.max_cell = Some((max_row.max(row), max_col.max(col)));
                    data.cells.insert(
                        (row, col),
                        Cell {
                            row,
                            col,
                            value,
                            style,
                        },
                    );
                }
                b"hyperlink" => {
                    if let Some(link) = parse_hyperlink(e, rels)? {
                        data.hyperlinks.push(link);
                    }
                }
                _ => {}
            },
            Event::End(ref e) if e.local_name().as_ref() == b"sheetData" => in_sheet_data = false,
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(data)
}

/// Position, type and style of a `<c>` element; cells without `r` follow the previous one
fn cell_position(
    e: &BytesStart<'_>,
    current_row: u32,
    current_col: u32,
) -> Result<(u32, u32, String, Option<u32>)> {
    let mut r_attr = String::new();
    let mut t_attr = String::new();
    let mut style = None;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"r" => r_attr = attr.unescape_value()?.into_owned(),
            b"t" => t_attr = attr.unescape_value()?.into_owned(),
            b"s" => style = Some(attr.unescape_value()?.parse::<u32>()?),
            _ => {}
        }
    }

    let (row, col) = if r_attr.is_empty() {
        (current_row, current_col)
    } else {
        parse_cell_ref(&r_attr).unwrap_or((current_row, current_col))
    };
    Ok((row, col, t_attr, style))
}

fn parse_cell_contents<R: std::io::BufRead>(
    reader: &mut Reader<R>,
    t_attr: &str,
    shared_strings: &[String],
) -> Result<CellValue> {
    let mut value = CellValue::Empty;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"v" => {
                    let v_text = read_text_node(reader)?;
                    value = match t_attr {
                        "s" => {
                            let idx = v_text.trim().parse::<usize>().unwrap_or(0);
                            CellValue::Text(shared_strings.get(idx).cloned().unwrap_or_default())
                        }
                        "b" => CellValue::Boolean(v_text.trim() == "1"),
                        "e" => CellValue::Error(v_text),
                        "str" | "inlineStr" | "d" => CellValue::Text(v_text),
                        _ => match v_text.trim().parse::<f64>() {
                            Ok(n) => CellValue::Number(n),
                            Err(_) => CellValue::Text(v_text),
                        },
                    };
                }
                b"is" => value = CellValue::Text(read_inline_string(reader)?),
                // Formula text is not needed, only its cached value
                b"f" => {
                    read_text_node(reader)?;
                }
                _ => {}
            },
            Event::End(ref e) if e.local_name().as_ref() == b"c" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(value)
}

/// Inline strings can have multiple <t> tags (rich text runs)
fn read_inline_string<R: std::io::BufRead>(reader: &mut Reader<R>) -> Result<String> {
    let mut text = String::new();
    let mut buf = Vec::new();
    let mut in_phonetic = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) if e.local_name().as_ref() == b"rPh" => in_phonetic = true,
            Event::End(ref e) if e.local_name().as_ref() == b"rPh" => in_phonetic = false,
            Event::Start(ref e) if e.local_name().as_ref() == b"t" => {
                let t = read_text_node(reader)?;
                if !in_phonetic {
                    text.push_str(&t);
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"is" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

fn parse_hyperlink(e: &BytesStart<'_>, rels: &[Relationship]) -> Result<Option<Hyperlink>> {
    let mut reference = None;
    let mut rel_id = None;
    let mut location = None;
    let mut display = None;

    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"ref" => reference = Some(attr.unescape_value()?.into_owned()),
            b"location" => location = Some(attr.unescape_value()?.into_owned()),
            b"display" => display = Some(attr.unescape_value()?.into_owned()),
            _ if attr.key.local_name().as_ref() == b"id" && attr.key.prefix().is_some() => {
                rel_id = Some(attr.unescape_value()?.into_owned());
            }
            _ => {}
        }
    }

    let Some((start_row, start_col, end_row, end_col)) =
        reference.as_deref().and_then(parse_cell_range)
    else {
        log::warn!("Ignoring hyperlink with invalid ref {:?}", reference);
        return Ok(None);
    };

    let target = rel_id.as_deref().and_then(|id| {
        rels.iter()
            .find(|r| r.id == id && r.rel_type.ends_with("/hyperlink"))
            .map(|r| r.target.clone())
    });

    Ok(Some(Hyperlink {
        first: (start_row, start_col),
        last: (end_row, end_col),
        rel_id,
        target,
        location,
        display,
    }))
}
