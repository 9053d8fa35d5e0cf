//! Workbook data structures

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Summary of a workbook: its path and the sheets it contains
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkbookInfo {
    pub path: PathBuf,
    pub sheets: Vec<SheetInfo>,
}

impl WorkbookInfo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheets: Vec::new(),
        }
    }

    /// Get a sheet by its 1-based index
    pub fn sheet(&self, index: u32) -> Option<&SheetInfo> {
        self.sheets.iter().find(|s| s.index == index)
    }

    /// Get a sheet by name
    pub fn get_sheet(&self, name: &str) -> Option<&SheetInfo> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Get all sheet names
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Metadata for a single sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetInfo {
    pub name: String,
    /// 1-based position in the workbook
    pub index: u32,
    pub kind: SheetKind,
    pub last_cell: LastCell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetKind {
    #[default]
    Worksheet,
    Chartsheet,
}

/// Bottom-right corner of the used area, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastCell {
    pub row: u32,
    pub column: u32,
}

impl LastCell {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl Default for LastCell {
    fn default() -> Self {
        Self { row: 1, column: 1 }
    }
}

/// Parsed contents of one worksheet part
#[derive(Debug, Clone, Default)]
pub struct SheetData {
    pub cells: HashMap<(u32, u32), Cell>,
    pub hyperlinks: Vec<Hyperlink>,
    /// (row, col) of the bottom-right `<c>` element, 0-based
    pub max_cell: Option<(u32, u32)>,
}

impl SheetData {
    /// Get a cell at the given position
    pub fn get_cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Value of a cell; missing cells are empty
    pub fn value(&self, row: u32, col: u32) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.get_cell(row, col).map(|c| &c.value).unwrap_or(&EMPTY)
    }

    /// Style index of a cell, if it has one
    pub fn style(&self, row: u32, col: u32) -> Option<u32> {
        self.get_cell(row, col).and_then(|c| c.style)
    }

    /// First hyperlink whose range covers the cell
    pub fn hyperlink_at(&self, row: u32, col: u32) -> Option<&Hyperlink> {
        self.hyperlinks.iter().find(|h| h.contains(row, col))
    }

    pub fn last_cell(&self) -> LastCell {
        self.max_cell
            .map(|(row, col)| LastCell::new(row + 1, col + 1))
            .unwrap_or_default()
    }
}

/// Represents a single cell
#[derive(Debug, Clone, Default)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
    pub value: CellValue,
    /// Index into `cellXfs` of the styles part
    pub style: Option<u32>,
}

/// Cell value types
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(String),
}

impl CellValue {
    /// Text shown for the value, `None` for empty cells
    pub fn display_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Number(n) => Some(format_number(*n)),
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Boolean(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            CellValue::Error(e) => Some(e.clone()),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// A `<hyperlink>` entry of a worksheet
#[derive(Debug, Clone, PartialEq)]
pub struct Hyperlink {
    /// Top-left cell of the anchor range, 0-based
    pub first: (u32, u32),
    /// Bottom-right cell of the anchor range, 0-based
    pub last: (u32, u32),
    pub rel_id: Option<String>,
    /// External address resolved through the sheet relationships
    pub target: Option<String>,
    /// Location inside the workbook for internal links
    pub location: Option<String>,
    pub display: Option<String>,
}

impl Hyperlink {
    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.first.0 && row <= self.last.0 && col >= self.first.1 && col <= self.last.1
    }

    /// Whether the link is anchored on exactly this one cell
    pub fn is_anchored_on(&self, row: u32, col: u32) -> bool {
        self.first == (row, col) && self.last == (row, col)
    }
}
