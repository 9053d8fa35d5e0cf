//! Streaming rewrites of SpreadsheetML parts

use anyhow::{Context, Result, bail};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::reader::package::Package;
use crate::reader::parser_utils::{cell_ref, parse_cell_range, parse_cell_ref};
use crate::reader::xlsx_parser::{NS_RELATIONSHIPS, Relationship};

const NS_PACKAGE_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";

/// Elements that come after `<hyperlinks>` in a worksheet
const AFTER_HYPERLINKS: &[&[u8]] = &[
    b"printOptions",
    b"pageMargins",
    b"pageSetup",
    b"headerFooter",
    b"rowBreaks",
    b"colBreaks",
    b"customProperties",
    b"cellWatches",
    b"ignoredErrors",
    b"smartTags",
    b"drawing",
    b"legacyDrawing",
    b"legacyDrawingHF",
    b"drawingHF",
    b"picture",
    b"oleObjects",
    b"controls",
    b"webPublishItems",
    b"tableParts",
    b"extLst",
];

/// New state of one cell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellPatch {
    /// Replacement style index; `None` keeps the cell's current style
    pub style: Option<u32>,
    /// Replacement text; `None` keeps the cell's current content,
    /// an empty string clears it
    pub text: Option<String>,
}

/// A hyperlink to anchor on a single cell
#[derive(Debug, Clone, PartialEq)]
pub struct HyperlinkPatch {
    pub row: u32,
    pub col: u32,
    pub rel_id: String,
    pub display: String,
}

/// Everything to change in one worksheet part
#[derive(Debug, Clone, Default)]
pub struct SheetPatch {
    /// row -> col -> patch, 0-based
    pub cells: BTreeMap<u32, BTreeMap<u32, CellPatch>>,
    /// Added hyperlinks; existing hyperlinks anchored on the same cell are dropped
    pub hyperlinks: Vec<HyperlinkPatch>,
}

impl SheetPatch {
    pub fn cell_mut(&mut self, row: u32, col: u32) -> &mut CellPatch {
        self.cells.entry(row).or_default().entry(col).or_default()
    }

    /// (min_row, min_col, max_row, max_col) over all patched cells
    fn bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let min_row = *self.cells.keys().next()?;
        let max_row = *self.cells.keys().next_back()?;
        let min_col = self.cells.values().filter_map(|c| c.keys().next()).min()?;
        let max_col = self.cells.values().filter_map(|c| c.keys().next_back()).max()?;
        Some((min_row, *min_col, max_row, *max_col))
    }
}

/// Element names carrying the root element's namespace prefix, so that
/// `<x:worksheet>` documents get `<x:c>` cells
#[derive(Debug, Clone, Default)]
pub(crate) struct ElementNames {
    prefix: Option<String>,
}

impl ElementNames {
    pub(crate) fn from_root(e: &BytesStart<'_>) -> Self {
        let prefix = e
            .name()
            .prefix()
            .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());
        Self { prefix }
    }

    pub(crate) fn qualify(&self, local: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_string(),
        }
    }

    pub(crate) fn start(&self, local: &str) -> BytesStart<'static> {
        BytesStart::new(self.qualify(local))
    }

    pub(crate) fn end(&self, local: &str) -> BytesEnd<'static> {
        BytesEnd::new(self.qualify(local))
    }
}

/// Apply a patch to a worksheet XML document
pub fn rewrite_sheet(xml: &str, patch: &SheetPatch) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut pending = patch.cells.clone();
    let link_cells: HashSet<(u32, u32)> =
        patch.hyperlinks.iter().map(|h| (h.row, h.col)).collect();

    let mut names = ElementNames::default();
    let mut depth = 0usize;
    let mut skip_depth = 0usize;
    let mut in_sheet_data = false;
    let mut in_hyperlinks = false;
    let mut hyperlinks_written = patch.hyperlinks.is_empty();

    let mut current_row = 0u32;
    let mut seen_row = false;
    let mut current_col = 0u32;
    let mut row_cells: Option<BTreeMap<u32, CellPatch>> = None;

    loop {
        let event = reader.read_event()?;

        // Children of a replaced cell or dropped hyperlink
        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => bail!("Unexpected end of worksheet XML"),
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if depth == 0 {
                    names = ElementNames::from_root(&e);
                }

                if depth == 1 && !hyperlinks_written && AFTER_HYPERLINKS.contains(&name.as_slice()) {
                    write_hyperlinks_block(&mut writer, &names, &patch.hyperlinks)?;
                    hyperlinks_written = true;
                }

                match name.as_slice() {
                    b"worksheet" if depth == 0 && !patch.hyperlinks.is_empty() => {
                        writer.write_event(Event::Start(with_relationships_ns(&e)))?;
                    }
                    b"sheetData" => {
                        in_sheet_data = true;
                        writer.write_event(Event::Start(e))?;
                    }
                    b"row" if in_sheet_data => {
                        let row = row_number(&e, current_row, seen_row)?;
                        seen_row = true;
                        current_row = row;
                        current_col = 0;
                        flush_rows_before(&mut writer, &names, &mut pending, row)?;

                        row_cells = pending.remove(&row);
                        if row_cells.is_some() {
                            writer.write_event(Event::Start(replace_attr(&e, b"spans", None)))?;
                        } else {
                            writer.write_event(Event::Start(e))?;
                        }
                    }
                    b"c" if in_sheet_data => {
                        let (row, col) = cell_position(&e, current_row, current_col);
                        current_col = col + 1;
                        if let Some(cells) = row_cells.as_mut() {
                            flush_cells_before(&mut writer, &names, row, cells, col)?;
                            if let Some(cell) = cells.remove(&col) {
                                if cell.text.is_some() {
                                    let style = cell.style.or(current_style(&e));
                                    write_cell(&mut writer, &names, row, col, style, cell.text.as_deref())?;
                                    skip_depth = 1;
                                    continue;
                                }
                                write_restyled(&mut writer, &e, cell.style, false)?;
                                depth += 1;
                                continue;
                            }
                        }
                        writer.write_event(Event::Start(e))?;
                    }
                    b"hyperlinks" => {
                        in_hyperlinks = true;
                        writer.write_event(Event::Start(e))?;
                    }
                    b"hyperlink" if in_hyperlinks && anchored_on_any(&e, &link_cells) => {
                        skip_depth = 1;
                        continue;
                    }
                    _ => writer.write_event(Event::Start(e))?,
                }
                depth += 1;
            }
            Event::Empty(e) => {
                let name = e.local_name().as_ref().to_vec();

                if depth == 1 && !hyperlinks_written && AFTER_HYPERLINKS.contains(&name.as_slice()) {
                    write_hyperlinks_block(&mut writer, &names, &patch.hyperlinks)?;
                    hyperlinks_written = true;
                }

                match name.as_slice() {
                    b"dimension" => {
                        let widened = widen_dimension(&e, patch)?;
                        writer.write_event(Event::Empty(widened))?;
                    }
                    b"sheetData" => {
                        writer.write_event(Event::Start(e))?;
                        flush_rows_before(&mut writer, &names, &mut pending, u32::MAX)?;
                        writer.write_event(Event::End(names.end("sheetData")))?;
                    }
                    b"row" if in_sheet_data => {
                        let row = row_number(&e, current_row, seen_row)?;
                        seen_row = true;
                        current_row = row;
                        current_col = 0;
                        flush_rows_before(&mut writer, &names, &mut pending, row)?;

                        match pending.remove(&row) {
                            Some(cells) => {
                                writer.write_event(Event::Start(replace_attr(&e, b"spans", None)))?;
                                for (col, cell) in cells {
                                    write_cell(&mut writer, &names, row, col, cell.style, cell.text.as_deref())?;
                                }
                                writer.write_event(Event::End(names.end("row")))?;
                            }
                            None => writer.write_event(Event::Empty(e))?,
                        }
                    }
                    b"c" if in_sheet_data => {
                        let (row, col) = cell_position(&e, current_row, current_col);
                        current_col = col + 1;
                        let mut handled = false;
                        if let Some(cells) = row_cells.as_mut() {
                            flush_cells_before(&mut writer, &names, row, cells, col)?;
                            if let Some(cell) = cells.remove(&col) {
                                let style = cell.style.or(current_style(&e));
                                if cell.text.is_some() {
                                    write_cell(&mut writer, &names, row, col, style, cell.text.as_deref())?;
                                } else {
                                    write_restyled(&mut writer, &e, cell.style, true)?;
                                }
                                handled = true;
                            }
                        }
                        if !handled {
                            writer.write_event(Event::Empty(e))?;
                        }
                    }
                    b"hyperlinks" => {
                        writer.write_event(Event::Start(e))?;
                        for link in &patch.hyperlinks {
                            write_hyperlink(&mut writer, &names, link)?;
                        }
                        writer.write_event(Event::End(names.end("hyperlinks")))?;
                        hyperlinks_written = true;
                    }
                    b"hyperlink" if in_hyperlinks && anchored_on_any(&e, &link_cells) => {}
                    _ => writer.write_event(Event::Empty(e))?,
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                match e.local_name().as_ref() {
                    b"row" if in_sheet_data => {
                        if let Some(mut cells) = row_cells.take() {
                            flush_cells_before(&mut writer, &names, current_row, &mut cells, u32::MAX)?;
                        }
                    }
                    b"sheetData" => {
                        flush_rows_before(&mut writer, &names, &mut pending, u32::MAX)?;
                        in_sheet_data = false;
                    }
                    b"hyperlinks" => {
                        for link in &patch.hyperlinks {
                            write_hyperlink(&mut writer, &names, link)?;
                        }
                        in_hyperlinks = false;
                        hyperlinks_written = true;
                    }
                    b"worksheet" if depth == 0 && !hyperlinks_written => {
                        write_hyperlinks_block(&mut writer, &names, &patch.hyperlinks)?;
                        hyperlinks_written = true;
                    }
                    _ => {}
                }
                writer.write_event(Event::End(e))?;
            }
            Event::Eof => break,
            e => writer.write_event(e)?,
        }
    }

    if !pending.is_empty() {
        bail!("Worksheet has no sheetData element to receive new cells");
    }

    let result = writer.into_inner().into_inner();
    Ok(String::from_utf8(result)?)
}

fn row_number(e: &BytesStart<'_>, current_row: u32, seen_row: bool) -> Result<u32> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"r" {
            let r = attr.unescape_value()?.parse::<u32>()?;
            return Ok(r.saturating_sub(1));
        }
    }
    Ok(if seen_row { current_row + 1 } else { 0 })
}

fn cell_position(e: &BytesStart<'_>, current_row: u32, current_col: u32) -> (u32, u32) {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"r")
        .and_then(|a| a.unescape_value().ok().and_then(|v| parse_cell_ref(&v)))
        .unwrap_or((current_row, current_col))
}

fn current_style(e: &BytesStart<'_>) -> Option<u32> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"s")
        .and_then(|a| a.unescape_value().ok().and_then(|v| v.parse().ok()))
}

fn anchored_on_any(e: &BytesStart<'_>, cells: &HashSet<(u32, u32)>) -> bool {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"ref")
        .and_then(|a| a.unescape_value().ok().and_then(|v| parse_cell_range(&v)))
        .is_some_and(|(r1, c1, r2, c2)| r1 == r2 && c1 == c2 && cells.contains(&(r1, c1)))
}

/// Copy of `e` with `key` replaced (or removed when `value` is `None`)
pub(crate) fn replace_attr(e: &BytesStart<'_>, key: &[u8], value: Option<&str>) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() != key {
            out.push_attribute(attr);
        }
    }
    if let Some(value) = value {
        let key = String::from_utf8_lossy(key).into_owned();
        out.push_attribute((key.as_str(), value));
    }
    out
}

fn with_relationships_ns(e: &BytesStart<'_>) -> BytesStart<'static> {
    let declared = e
        .attributes()
        .flatten()
        .any(|a| a.key.as_ref() == b"xmlns:r");
    if declared {
        e.to_owned().into_owned()
    } else {
        replace_attr(e, b"xmlns:r", Some(NS_RELATIONSHIPS))
    }
}

fn widen_dimension(e: &BytesStart<'_>, patch: &SheetPatch) -> Result<BytesStart<'static>> {
    let Some((min_row, min_col, max_row, max_col)) = patch.bounds() else {
        return Ok(e.to_owned().into_owned());
    };

    let current = e
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"ref")
        .map(|a| a.unescape_value().map(|v| v.into_owned()))
        .transpose()?
        .and_then(|v| parse_cell_range(&v));

    let (r1, c1, r2, c2) = match current {
        Some((r1, c1, r2, c2)) => (
            r1.min(min_row),
            c1.min(min_col),
            r2.max(max_row),
            c2.max(max_col),
        ),
        None => (min_row, min_col, max_row, max_col),
    };

    let reference = if (r1, c1) == (r2, c2) {
        cell_ref(r1, c1)
    } else {
        format!("{}:{}", cell_ref(r1, c1), cell_ref(r2, c2))
    };
    Ok(replace_attr(e, b"ref", Some(&reference)))
}

fn write_restyled<W: Write>(
    writer: &mut Writer<W>,
    e: &BytesStart<'_>,
    style: Option<u32>,
    empty: bool,
) -> Result<()> {
    let start = match style {
        Some(s) => replace_attr(e, b"s", Some(&s.to_string())),
        None => e.to_owned().into_owned(),
    };
    if empty {
        writer.write_event(Event::Empty(start))?;
    } else {
        writer.write_event(Event::Start(start))?;
    }
    Ok(())
}

/// Write a cell; text is stored as an inline string
fn write_cell<W: Write>(
    writer: &mut Writer<W>,
    names: &ElementNames,
    row: u32,
    col: u32,
    style: Option<u32>,
    text: Option<&str>,
) -> Result<()> {
    let reference = cell_ref(row, col);
    let mut c = names.start("c");
    c.push_attribute(("r", reference.as_str()));
    let style = style.map(|s| s.to_string());
    if let Some(s) = style.as_deref() {
        c.push_attribute(("s", s));
    }

    match text {
        Some(text) if !text.is_empty() => {
            c.push_attribute(("t", "inlineStr"));
            writer.write_event(Event::Start(c))?;
            writer.write_event(Event::Start(names.start("is")))?;
            let mut t = names.start("t");
            if text.trim() != text {
                t.push_attribute(("xml:space", "preserve"));
            }
            writer.write_event(Event::Start(t))?;
            writer.write_event(Event::Text(BytesText::new(text)))?;
            writer.write_event(Event::End(names.end("t")))?;
            writer.write_event(Event::End(names.end("is")))?;
            writer.write_event(Event::End(names.end("c")))?;
        }
        _ => writer.write_event(Event::Empty(c))?,
    }
    Ok(())
}

/// Write patched cells with a column before `limit`
fn flush_cells_before<W: Write>(
    writer: &mut Writer<W>,
    names: &ElementNames,
    row: u32,
    cells: &mut BTreeMap<u32, CellPatch>,
    limit: u32,
) -> Result<()> {
    while cells.first_key_value().is_some_and(|(&col, _)| col < limit) {
        if let Some((col, cell)) = cells.pop_first() {
            write_cell(writer, names, row, col, cell.style, cell.text.as_deref())?;
        }
    }
    Ok(())
}

/// Write whole new rows for patched rows before `limit`
fn flush_rows_before<W: Write>(
    writer: &mut Writer<W>,
    names: &ElementNames,
    pending: &mut BTreeMap<u32, BTreeMap<u32, CellPatch>>,
    limit: u32,
) -> Result<()> {
    while pending.first_key_value().is_some_and(|(&row, _)| row < limit) {
        if let Some((row, cells)) = pending.pop_first() {
            let mut start = names.start("row");
            let r = (row + 1).to_string();
            start.push_attribute(("r", r.as_str()));
            writer.write_event(Event::Start(start))?;
            for (col, cell) in cells {
                write_cell(writer, names, row, col, cell.style, cell.text.as_deref())?;
            }
            writer.write_event(Event::End(names.end("row")))?;
        }
    }
    Ok(())
}

fn write_hyperlink<W: Write>(
    writer: &mut Writer<W>,
    names: &ElementNames,
    link: &HyperlinkPatch,
) -> Result<()> {
    let reference = cell_ref(link.row, link.col);
    let mut e = names.start("hyperlink");
    e.push_attribute(("ref", reference.as_str()));
    e.push_attribute(("r:id", link.rel_id.as_str()));
    e.push_attribute(("display", link.display.as_str()));
    writer.write_event(Event::Empty(e))?;
    Ok(())
}

fn write_hyperlinks_block<W: Write>(
    writer: &mut Writer<W>,
    names: &ElementNames,
    links: &[HyperlinkPatch],
) -> Result<()> {
    writer.write_event(Event::Start(names.start("hyperlinks")))?;
    for link in links {
        write_hyperlink(writer, names, link)?;
    }
    writer.write_event(Event::End(names.end("hyperlinks")))?;
    Ok(())
}

/// First free `rIdN` number among `rels`
pub fn next_relationship_id(rels: &[Relationship]) -> u32 {
    rels.iter()
        .filter_map(|r| r.id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()))
        .max()
        .unwrap_or(0)
        + 1
}

/// Remove relationships by id and append new ones; `xml` is `None` when the
/// `.rels` part does not exist yet
pub fn rewrite_relationships(
    xml: Option<&str>,
    remove: &HashSet<String>,
    add: &[Relationship],
) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let Some(xml) = xml else {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        let mut root = BytesStart::new("Relationships");
        root.push_attribute(("xmlns", NS_PACKAGE_RELATIONSHIPS));
        writer.write_event(Event::Start(root))?;
        for rel in add {
            write_relationship(&mut writer, rel)?;
        }
        writer.write_event(Event::End(BytesEnd::new("Relationships")))?;
        return Ok(String::from_utf8(writer.into_inner().into_inner())?);
    };

    let mut reader = Reader::from_str(xml);
    let mut skip_current = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"Relationship" => {
                if has_removed_id(&e, remove) {
                    skip_current = true;
                } else {
                    writer.write_event(Event::Start(e))?;
                }
            }
            Event::Empty(e) if e.name().as_ref() == b"Relationship" => {
                if !has_removed_id(&e, remove) {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::End(e) if e.name().as_ref() == b"Relationship" => {
                if skip_current {
                    skip_current = false;
                } else {
                    writer.write_event(Event::End(e))?;
                }
            }
            Event::End(e) if e.name().as_ref() == b"Relationships" => {
                for rel in add {
                    write_relationship(&mut writer, rel)?;
                }
                writer.write_event(Event::End(e))?;
            }
            Event::Empty(e) if e.name().as_ref() == b"Relationships" => {
                writer.write_event(Event::Start(e))?;
                for rel in add {
                    write_relationship(&mut writer, rel)?;
                }
                writer.write_event(Event::End(BytesEnd::new("Relationships")))?;
            }
            Event::Eof => break,
            e => {
                if !skip_current {
                    writer.write_event(e)?;
                }
            }
        }
    }

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

fn has_removed_id(e: &BytesStart<'_>, remove: &HashSet<String>) -> bool {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"Id")
        .and_then(|a| a.unescape_value().ok())
        .is_some_and(|id| remove.contains(id.as_ref()))
}

fn write_relationship<W: Write>(writer: &mut Writer<W>, rel: &Relationship) -> Result<()> {
    let mut e = BytesStart::new("Relationship");
    e.push_attribute(("Id", rel.id.as_str()));
    e.push_attribute(("Type", rel.rel_type.as_str()));
    e.push_attribute(("Target", rel.target.as_str()));
    if rel.external {
        e.push_attribute(("TargetMode", "External"));
    }
    writer.write_event(Event::Empty(e))?;
    Ok(())
}

/// A `<Default>` or `<Override>` entry of `[Content_Types].xml`
#[derive(Debug, Clone, Copy)]
pub enum ContentTypeEntry<'a> {
    Default { extension: &'a str, content_type: &'a str },
    Override { part_name: &'a str, content_type: &'a str },
}

/// Add a content type entry unless an equivalent one is already declared
pub fn ensure_content_type(xml: &str, entry: ContentTypeEntry<'_>) -> Result<String> {
    let (element, key, value, content_type) = match entry {
        ContentTypeEntry::Default {
            extension,
            content_type,
        } => ("Default", "Extension", extension, content_type),
        ContentTypeEntry::Override {
            part_name,
            content_type,
        } => ("Override", "PartName", part_name, content_type),
    };

    let declares = |e: &BytesStart<'_>| {
        e.name().as_ref() == element.as_bytes()
            && e.attributes()
                .flatten()
                .find(|a| a.key.as_ref() == key.as_bytes())
                .and_then(|a| a.unescape_value().ok())
                .is_some_and(|v| v.eq_ignore_ascii_case(value))
    };

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut present = false;

    loop {
        match reader.read_event()? {
            Event::Empty(e) => {
                present |= declares(&e);
                writer.write_event(Event::Empty(e))?;
            }
            Event::Start(e) => {
                present |= declares(&e);
                writer.write_event(Event::Start(e))?;
            }
            Event::End(e) if e.name().as_ref() == b"Types" => {
                if !present {
                    let mut added = BytesStart::new(element);
                    added.push_attribute((key, value));
                    added.push_attribute(("ContentType", content_type));
                    writer.write_event(Event::Empty(added))?;
                    log::debug!("Registered content type for {}", value);
                }
                writer.write_event(Event::End(e))?;
            }
            Event::Eof => break,
            e => writer.write_event(e)?,
        }
    }

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

/// Write the package to `output`, replacing it atomically
pub fn save_package(package: &Package, output: &Path) -> Result<()> {
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

    let mut zip_writer = ZipWriter::new(temp.as_file_mut());
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for entry in package.entries() {
        zip_writer.start_file(entry.name.as_str(), options)?;
        zip_writer.write_all(&entry.data)?;
    }
    zip_writer.finish()?;

    // the temp file is created 0600; an in-place save keeps the workbook's mode
    if let Ok(metadata) = fs::metadata(output) {
        temp.as_file()
            .set_permissions(metadata.permissions())
            .with_context(|| format!("Failed to copy permissions of {}", output.display()))?;
    }

    temp.persist(output)
        .with_context(|| format!("Failed to save workbook: {}", output.display()))?;
    log::debug!("Saved {} entries to {}", package.entries().len(), output.display());
    Ok(())
}
