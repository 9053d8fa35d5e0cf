//! Workbook readers: SpreadsheetML parsing for OOXML packages, calamine for
//! legacy formats that can only be inspected

use anyhow::{Context, Result};
use calamine::{Reader, Sheets, open_workbook_auto};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub mod package;
pub mod parser_utils;
pub mod workbook;
pub mod xlsx_parser;

use self::package::Package;
use self::xlsx_parser::{Relationship, SheetEntry};
use crate::error::SheetError;
pub use workbook::{
    Cell, CellValue, Hyperlink, LastCell, SheetData, SheetInfo, SheetKind, WorkbookInfo,
};

/// File formats the readers understand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookFormat {
    /// `.xlsx` / `.xlsm`: readable and writable
    Ooxml,
    /// `.xls` / `.xlsb` / `.ods`: inspection only
    Legacy,
}

impl WorkbookFormat {
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "xlsx" | "xlsm" => Ok(WorkbookFormat::Ooxml),
            "xls" | "xlsb" | "ods" => Ok(WorkbookFormat::Legacy),
            _ => Err(SheetError::UnsupportedFormat(path.display().to_string()).into()),
        }
    }
}

/// Trait for spreadsheet format readers
pub trait WorkbookReader {
    /// Sheets in tab order with their 1-based index and last used cell
    fn read_sheet_infos(&mut self) -> Result<Vec<SheetInfo>>;
}

/// Reader over an in-memory OOXML package
pub struct XlsxReader<'a> {
    package: &'a Package,
    workbook_part: String,
    shared_strings: Option<Vec<String>>,
}

impl<'a> XlsxReader<'a> {
    pub fn new(package: &'a Package) -> Result<Self> {
        let workbook_part = xlsx_parser::workbook_part_path(package)?;
        Ok(Self {
            package,
            workbook_part,
            shared_strings: None,
        })
    }

    pub fn sheet_entries(&self) -> Result<Vec<SheetEntry>> {
        xlsx_parser::read_sheet_entries(self.package, &self.workbook_part)
    }

    /// Relationships of a worksheet part
    pub fn sheet_relationships(&self, entry: &SheetEntry) -> Result<Vec<Relationship>> {
        xlsx_parser::read_relationships(self.package, &entry.part_path)
    }

    /// Parse the cells and hyperlinks of a worksheet
    pub fn read_sheet(&mut self, entry: &SheetEntry) -> Result<SheetData> {
        if entry.kind != SheetKind::Worksheet {
            return Ok(SheetData::default());
        }

        if self.shared_strings.is_none() {
            self.shared_strings = Some(xlsx_parser::read_shared_strings(
                self.package,
                &self.workbook_part,
            )?);
        }
        let shared_strings = self.shared_strings.as_deref().unwrap_or_default();

        let xml = self.package.require_string(&entry.part_path)?;
        let rels = self.sheet_relationships(entry)?;
        xlsx_parser::parse_sheet(&xml, shared_strings, &rels)
            .with_context(|| format!("Failed to parse sheet '{}'", entry.name))
    }
}

impl WorkbookReader for XlsxReader<'_> {
    fn read_sheet_infos(&mut self) -> Result<Vec<SheetInfo>> {
        let mut infos = Vec::new();
        for entry in self.sheet_entries()? {
            let last_cell = self.read_sheet(&entry)?.last_cell();
            log::debug!(
                "Sheet {} '{}' ({}): last cell {:?}",
                entry.index,
                entry.name,
                entry.part_path,
                last_cell
            );
            infos.push(SheetInfo {
                name: entry.name,
                index: entry.index,
                kind: entry.kind,
                last_cell,
            });
        }
        Ok(infos)
    }
}

/// Reader for formats calamine understands but we cannot write back
pub struct CalamineReader {
    path: PathBuf,
    workbook: Sheets<BufReader<File>>,
}

impl CalamineReader {
    pub fn open(path: &Path) -> Result<Self> {
        let workbook = open_workbook_auto(path)
            .with_context(|| format!("Failed to open workbook: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            workbook,
        })
    }
}

impl WorkbookReader for CalamineReader {
    fn read_sheet_infos(&mut self) -> Result<Vec<SheetInfo>> {
        let names = self.workbook.sheet_names();
        let mut infos = Vec::with_capacity(names.len());

        for (i, name) in names.iter().enumerate() {
            let range = self.workbook.worksheet_range(name).with_context(|| {
                format!("Failed to read sheet '{}' of {}", name, self.path.display())
            })?;
            let last_cell = range
                .end()
                .map(|(row, col)| LastCell::new(row + 1, col + 1))
                .unwrap_or_default();

            infos.push(SheetInfo {
                name: name.clone(),
                index: i as u32 + 1,
                kind: SheetKind::Worksheet,
                last_cell,
            });
        }

        Ok(infos)
    }
}
