//! Picture records and the sheet area they are read from

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::SheetError;
use crate::reader::parser_utils::{MAX_ROW, column_index};
use crate::reader::{SheetInfo, SheetKind, WorkbookInfo};

/// One picture listed in the sheet, and later its upload result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictureItem {
    pub name: String,
    /// Source hyperlink when read; uploaded URL or failure text after upload
    pub address: Option<String>,
    /// Whether the upload succeeded
    #[serde(default)]
    pub status: bool,
}

impl PictureItem {
    pub fn new(name: impl Into<String>, address: Option<String>) -> Self {
        Self {
            name: name.into(),
            address,
            status: false,
        }
    }

    pub fn mark_uploaded(&mut self, url: impl Into<String>) {
        self.status = true;
        self.address = Some(url.into());
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = false;
        self.address = Some(message.into());
    }
}

/// Where the picture table lives: the sheet, the rows and the two columns.
///
/// Rows and the sheet index are 1-based; columns are letters (`A`..=`XFD`).
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceInfo {
    pub workbook: WorkbookInfo,
    pub selected_sheet_index: u32,
    pub row_begin: u32,
    pub row_end: u32,
    pub column_picture_names: String,
    pub column_picture_hyperlinks: String,
}

impl WorkspaceInfo {
    /// Check the sheet index, the row range and both column letters
    pub fn validate(&self) -> Result<()> {
        let sheet = self.selected_sheet()?;
        if sheet.kind != SheetKind::Worksheet {
            return Err(SheetError::NotAWorksheet(sheet.name.clone()).into());
        }

        if self.row_begin < 1 || self.row_begin > self.row_end || self.row_end > MAX_ROW {
            return Err(SheetError::InvalidRowRange {
                begin: self.row_begin,
                end: self.row_end,
            }
            .into());
        }

        self.names_column()?;
        self.links_column()?;
        Ok(())
    }

    pub fn selected_sheet(&self) -> Result<&SheetInfo> {
        self.workbook
            .sheet(self.selected_sheet_index)
            .ok_or_else(|| {
                SheetError::SheetIndexOutOfRange {
                    index: self.selected_sheet_index,
                    count: self.workbook.sheets.len(),
                }
                .into()
            })
    }

    /// 0-based column of the picture names
    pub fn names_column(&self) -> Result<u32> {
        parse_column(&self.column_picture_names)
    }

    /// 0-based column of the source hyperlinks
    pub fn links_column(&self) -> Result<u32> {
        parse_column(&self.column_picture_hyperlinks)
    }

    /// 0-based rows of the picture table
    pub fn rows(&self) -> std::ops::RangeInclusive<u32> {
        self.row_begin.saturating_sub(1)..=self.row_end.saturating_sub(1)
    }

    pub fn row_count(&self) -> usize {
        self.row_end.saturating_add(1).saturating_sub(self.row_begin) as usize
    }
}

fn parse_column(letters: &str) -> Result<u32> {
    column_index(letters.trim()).ok_or_else(|| SheetError::InvalidColumn(letters.to_string()).into())
}
