//! Writer module for applying cell edits to xlsx packages

mod styles;
mod xlsx_writer;

pub use styles::{DEFAULT_STYLES, HighlightStyles, add_highlight_styles};
pub use xlsx_writer::{
    CellPatch, ContentTypeEntry, HyperlinkPatch, SheetPatch, ensure_content_type,
    next_relationship_id, rewrite_relationships, rewrite_sheet, save_package,
};

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::reader::SheetData;
use crate::reader::package::Package;
use crate::reader::parser_utils::{rels_path_for, resolve_part_path};
use crate::reader::xlsx_parser::{
    REL_HYPERLINK, REL_STYLES, Relationship, SheetEntry, parse_relationships,
    workbook_part_path, workbook_related_part,
};

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const CT_RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
const CT_STYLES: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";

/// Changes to a single worksheet. Coordinates are 0-based (row, column).
#[derive(Debug, Clone, Default)]
pub struct SheetEdits {
    highlights: BTreeSet<(u32, u32)>,
    values: BTreeMap<(u32, u32), String>,
    hyperlinks: BTreeMap<(u32, u32), ExternalLink>,
}

#[derive(Debug, Clone, PartialEq)]
struct ExternalLink {
    address: String,
    display: String,
}

impl SheetEdits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the cell with the highlight colour, keeping its other formatting
    pub fn highlight(&mut self, row: u32, col: u32) {
        self.highlights.insert((row, col));
    }

    /// Store a plain text value; an empty string clears the cell
    pub fn set_text(&mut self, row: u32, col: u32, text: impl Into<String>) {
        self.hyperlinks.remove(&(row, col));
        self.values.insert((row, col), text.into());
    }

    /// Anchor an external hyperlink on the cell, showing `display` as its text
    pub fn set_hyperlink(
        &mut self,
        row: u32,
        col: u32,
        address: impl Into<String>,
        display: impl Into<String>,
    ) {
        self.values.remove(&(row, col));
        self.hyperlinks.insert(
            (row, col),
            ExternalLink {
                address: address.into(),
                display: display.into(),
            },
        );
    }

    pub fn highlighted_cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.highlights.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty() && self.values.is_empty() && self.hyperlinks.is_empty()
    }
}

/// Apply `edits` to the worksheet `sheet` of an in-memory package.
///
/// `data` is the parsed content of the same worksheet; it supplies the
/// current cell styles and hyperlinks.
pub fn apply_sheet_edits(
    package: &mut Package,
    sheet: &SheetEntry,
    data: &SheetData,
    edits: &SheetEdits,
    highlight_color: &str,
) -> Result<()> {
    if edits.is_empty() {
        return Ok(());
    }

    let mut patch = SheetPatch::default();
    for (&(row, col), text) in &edits.values {
        patch.cell_mut(row, col).text = Some(text.clone());
    }

    if !edits.highlights.is_empty() {
        let sources: BTreeSet<u32> = edits
            .highlights
            .iter()
            .map(|&(row, col)| data.style(row, col).unwrap_or(0))
            .collect();
        let mapping = highlight_styles(package, &sources, highlight_color)?;

        for &(row, col) in &edits.highlights {
            let source = data.style(row, col).unwrap_or(0);
            patch.cell_mut(row, col).style = mapping.get(&source).copied();
        }
    }

    if !edits.hyperlinks.is_empty() {
        add_hyperlinks(package, sheet, data, edits, &mut patch)?;
    }

    let xml = package.require_string(&sheet.part_path)?;
    let updated = rewrite_sheet(&xml, &patch)?;
    package.put(&sheet.part_path, updated.into_bytes());

    log::info!(
        "Updated sheet '{}': {} highlighted, {} values, {} hyperlinks",
        sheet.name,
        edits.highlights.len(),
        edits.values.len(),
        edits.hyperlinks.len()
    );
    Ok(())
}

/// Add the highlight cell formats to the stylesheet, creating one if needed
fn highlight_styles(
    package: &mut Package,
    sources: &BTreeSet<u32>,
    color: &str,
) -> Result<BTreeMap<u32, u32>> {
    let workbook_part = workbook_part_path(package)?;
    let styles_part = match workbook_related_part(package, &workbook_part, "/styles")? {
        Some(part) if package.contains(&part) => part,
        _ => register_default_styles(package, &workbook_part)?,
    };

    let xml = package.require_string(&styles_part)?;
    let styles = add_highlight_styles(&xml, sources, color)?;
    package.put(&styles_part, styles.xml.into_bytes());
    Ok(styles.mapping)
}

fn register_default_styles(package: &mut Package, workbook_part: &str) -> Result<String> {
    let part = resolve_part_path(workbook_part, "styles.xml");
    log::warn!("Workbook has no stylesheet, creating {}", part);
    if !package.contains(&part) {
        package.put(&part, DEFAULT_STYLES.as_bytes().to_vec());
    }

    let rels_path = rels_path_for(workbook_part);
    let rels_xml = package.read_string(&rels_path)?;
    let existing = match rels_xml.as_deref() {
        Some(xml) => parse_relationships(xml)?,
        None => Vec::new(),
    };
    let rel = Relationship {
        id: format!("rId{}", next_relationship_id(&existing)),
        rel_type: REL_STYLES.to_string(),
        target: "styles.xml".to_string(),
        external: false,
    };
    let rels = rewrite_relationships(rels_xml.as_deref(), &HashSet::new(), &[rel])?;
    package.put(&rels_path, rels.into_bytes());

    let part_name = format!("/{part}");
    register_content_type(
        package,
        ContentTypeEntry::Override {
            part_name: &part_name,
            content_type: CT_STYLES,
        },
    )?;
    Ok(part)
}

fn add_hyperlinks(
    package: &mut Package,
    sheet: &SheetEntry,
    data: &SheetData,
    edits: &SheetEdits,
    patch: &mut SheetPatch,
) -> Result<()> {
    let rels_path = rels_path_for(&sheet.part_path);
    let rels_xml = package.read_string(&rels_path)?;
    let existing = match rels_xml.as_deref() {
        Some(xml) => parse_relationships(xml)?,
        None => Vec::new(),
    };

    // Relationships of hyperlinks replaced by new ones, unless still shared
    let replaced: Vec<_> = data
        .hyperlinks
        .iter()
        .filter(|h| edits.hyperlinks.keys().any(|&(r, c)| h.is_anchored_on(r, c)))
        .collect();
    let kept_ids: HashSet<&str> = data
        .hyperlinks
        .iter()
        .filter(|h| !replaced.contains(h))
        .filter_map(|h| h.rel_id.as_deref())
        .collect();
    let removed: HashSet<String> = replaced
        .iter()
        .filter_map(|h| h.rel_id.as_deref())
        .filter(|id| !kept_ids.contains(id))
        .map(str::to_string)
        .collect();

    let mut next_id = next_relationship_id(&existing);
    let mut added = Vec::with_capacity(edits.hyperlinks.len());
    for (&(row, col), link) in &edits.hyperlinks {
        let id = format!("rId{next_id}");
        next_id += 1;

        added.push(Relationship {
            id: id.clone(),
            rel_type: REL_HYPERLINK.to_string(),
            target: link.address.clone(),
            external: true,
        });
        patch.hyperlinks.push(HyperlinkPatch {
            row,
            col,
            rel_id: id,
            display: link.display.clone(),
        });
        patch.cell_mut(row, col).text = Some(link.display.clone());
    }

    let rels = rewrite_relationships(rels_xml.as_deref(), &removed, &added)?;
    package.put(&rels_path, rels.into_bytes());

    if rels_xml.is_none() {
        register_content_type(
            package,
            ContentTypeEntry::Default {
                extension: "rels",
                content_type: CT_RELATIONSHIPS,
            },
        )?;
    }
    Ok(())
}

fn register_content_type(package: &mut Package, entry: ContentTypeEntry<'_>) -> Result<()> {
    let xml = package.require_string(CONTENT_TYPES_PART)?;
    let updated = ensure_content_type(&xml, entry)?;
    package.put(CONTENT_TYPES_PART, updated.into_bytes());
    Ok(())
}
