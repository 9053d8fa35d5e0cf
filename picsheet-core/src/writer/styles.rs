//! Highlight styles for marking invalid cells

use anyhow::{Result, bail};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Write};

use super::xlsx_writer::{ElementNames, replace_attr};

/// Stylesheet used when a package carries no styles part
pub const DEFAULT_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

/// Result of adding highlight styles to a stylesheet
#[derive(Debug, Clone)]
pub struct HighlightStyles {
    pub xml: String,
    /// Source cell format index -> highlighted cell format index
    pub mapping: BTreeMap<u32, u32>,
}

/// Existing `<fills>` and `<cellXfs>` tables
#[derive(Default)]
struct StyleTables {
    names: ElementNames,
    has_fills: bool,
    fill_count: u32,
    has_cell_xfs: bool,
    cell_xfs: Vec<Vec<Event<'static>>>,
}

fn scan_tables(xml: &str) -> Result<StyleTables> {
    let mut reader = Reader::from_str(xml);
    let mut tables = StyleTables::default();
    let mut in_fills = false;
    let mut in_cell_xfs = false;
    let mut current_xf: Option<Vec<Event<'static>>> = None;

    loop {
        let event = reader.read_event()?;
        if let Some(xf) = current_xf.as_mut() {
            let done = matches!(&event, Event::End(e) if e.local_name().as_ref() == b"xf");
            xf.push(event.into_owned());
            if done {
                tables.cell_xfs.extend(current_xf.take());
            }
            continue;
        }

        match event {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                match name.as_slice() {
                    b"styleSheet" => tables.names = ElementNames::from_root(&e),
                    b"fills" => {
                        tables.has_fills = true;
                        in_fills = true;
                    }
                    b"fill" if in_fills => tables.fill_count += 1,
                    b"cellXfs" => {
                        tables.has_cell_xfs = true;
                        in_cell_xfs = true;
                    }
                    b"xf" if in_cell_xfs => current_xf = Some(vec![Event::Start(e.into_owned())]),
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let name = e.local_name().as_ref().to_vec();
                match name.as_slice() {
                    b"fills" => tables.has_fills = true,
                    b"fill" if in_fills => tables.fill_count += 1,
                    b"cellXfs" => tables.has_cell_xfs = true,
                    b"xf" if in_cell_xfs => tables.cell_xfs.push(vec![Event::Empty(e.into_owned())]),
                    _ => {}
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"fills" => in_fills = false,
                b"cellXfs" => in_cell_xfs = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(tables)
}

/// Append a solid fill of colour `argb` and, for each source format in
/// `sources`, a copy of that cell format using the new fill.
///
/// Source indexes past the end of `cellXfs` are treated as the default format.
pub fn add_highlight_styles(xml: &str, sources: &BTreeSet<u32>, argb: &str) -> Result<HighlightStyles> {
    let tables = scan_tables(xml)?;
    if !tables.has_fills {
        bail!("Stylesheet has no <fills> table");
    }
    if !tables.has_cell_xfs {
        bail!("Stylesheet has no <cellXfs> table");
    }

    let fill_id = tables.fill_count.to_string();
    let first_new_xf = tables.cell_xfs.len() as u32;
    let mapping: BTreeMap<u32, u32> = sources
        .iter()
        .enumerate()
        .map(|(i, &source)| (source, first_new_xf + i as u32))
        .collect();

    let new_xfs: Vec<Vec<Event<'static>>> = sources
        .iter()
        .map(|&source| {
            let template = tables
                .cell_xfs
                .get(source as usize)
                .cloned()
                .unwrap_or_else(|| default_xf(&tables.names));
            highlighted_xf(template, &fill_id)
        })
        .collect();

    let fill_count = (tables.fill_count + 1).to_string();
    let xf_count = (tables.cell_xfs.len() + new_xfs.len()).to_string();

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"fills" => {
                writer.write_event(Event::Start(replace_attr(&e, b"count", Some(&fill_count))))?;
            }
            Event::End(e) if e.local_name().as_ref() == b"fills" => {
                write_solid_fill(&mut writer, &tables.names, argb)?;
                writer.write_event(Event::End(e))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"fills" => {
                writer.write_event(Event::Start(replace_attr(&e, b"count", Some(&fill_count))))?;
                write_solid_fill(&mut writer, &tables.names, argb)?;
                writer.write_event(Event::End(tables.names.end("fills")))?;
            }
            Event::Start(e) if e.local_name().as_ref() == b"cellXfs" => {
                writer.write_event(Event::Start(replace_attr(&e, b"count", Some(&xf_count))))?;
            }
            Event::End(e) if e.local_name().as_ref() == b"cellXfs" => {
                for xf in &new_xfs {
                    for event in xf {
                        writer.write_event(event.clone())?;
                    }
                }
                writer.write_event(Event::End(e))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"cellXfs" => {
                writer.write_event(Event::Start(replace_attr(&e, b"count", Some(&xf_count))))?;
                for xf in &new_xfs {
                    for event in xf {
                        writer.write_event(event.clone())?;
                    }
                }
                writer.write_event(Event::End(tables.names.end("cellXfs")))?;
            }
            Event::Eof => break,
            e => writer.write_event(e)?,
        }
    }

    log::debug!(
        "Added highlight fill {} and {} cell formats",
        fill_id,
        mapping.len()
    );

    Ok(HighlightStyles {
        xml: String::from_utf8(writer.into_inner().into_inner())?,
        mapping,
    })
}

fn default_xf(names: &ElementNames) -> Vec<Event<'static>> {
    let mut xf = names.start("xf");
    for (key, value) in [("numFmtId", "0"), ("fontId", "0"), ("fillId", "0"), ("borderId", "0"), ("xfId", "0")] {
        xf.push_attribute((key, value));
    }
    vec![Event::Empty(xf)]
}

fn highlighted_xf(mut xf: Vec<Event<'static>>, fill_id: &str) -> Vec<Event<'static>> {
    if let Some(first) = xf.first_mut() {
        let replaced = match &*first {
            Event::Start(e) => Event::Start(with_fill(e, fill_id)),
            Event::Empty(e) => Event::Empty(with_fill(e, fill_id)),
            other => other.clone(),
        };
        *first = replaced;
    }
    xf
}

fn with_fill(e: &BytesStart<'_>, fill_id: &str) -> BytesStart<'static> {
    let e = replace_attr(e, b"fillId", Some(fill_id));
    replace_attr(&e, b"applyFill", Some("1"))
}

fn write_solid_fill<W: Write>(writer: &mut Writer<W>, names: &ElementNames, argb: &str) -> Result<()> {
    let mut pattern = names.start("patternFill");
    pattern.push_attribute(("patternType", "solid"));
    let mut fg = names.start("fgColor");
    fg.push_attribute(("rgb", argb));
    let mut bg = names.start("bgColor");
    bg.push_attribute(("indexed", "64"));

    writer.write_event(Event::Start(names.start("fill")))?;
    writer.write_event(Event::Start(pattern))?;
    writer.write_event(Event::Empty(fg))?;
    writer.write_event(Event::Empty(bg))?;
    writer.write_event(Event::End(names.end("patternFill")))?;
    writer.write_event(Event::End(names.end("fill")))?;
    Ok(())
}
