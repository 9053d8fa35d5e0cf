//! picsheet: read picture lists from Excel workbooks and write upload
//! results back
//!
//! A picture table is a range of rows holding a picture name in one column
//! and a hyperlink to the picture in another. Rows are validated when read;
//! bad cells are highlighted in the file itself. After uploading, results
//! are written to the first free column as links or plain text.

pub mod config;
pub mod error;
pub mod picture;
pub mod progress;
pub mod reader;
pub mod session;
pub mod writer;

use anyhow::Result;
use std::path::Path;

pub use config::{OutputConfig, PicsheetConfig, WorkspaceConfig};
pub use error::SheetError;
pub use picture::{PictureItem, WorkspaceInfo};
pub use progress::{NoProgress, ProgressReporter};
pub use reader::{LastCell, SheetInfo, SheetKind, WorkbookInfo};
pub use session::{WorkbookSession, read_workbook_info, url_from_cell};

use reader::parser_utils::{MAX_COLUMN, cell_ref};
use writer::SheetEdits;

const READING_STATUS: &str = "Reading records from the workbook";
const WRITING_STATUS: &str = "Writing results to the workbook";

/// Main interface for picture sheet operations
pub struct PictureSheet {
    config: PicsheetConfig,
}

impl PictureSheet {
    /// Create with default output settings
    pub fn new() -> Self {
        Self::with_config(PicsheetConfig::default())
    }

    pub fn with_config(config: PicsheetConfig) -> Self {
        Self { config }
    }

    /// Read and validate the picture rows of the workspace.
    ///
    /// Rows with an empty name or without a usable address are highlighted
    /// and saved in the workbook, and the call fails with
    /// [`SheetError::InvalidData`] listing those cells.
    pub fn read_picture_items<P: ProgressReporter + ?Sized>(
        &self,
        workspace: &WorkspaceInfo,
        progress: &mut P,
    ) -> Result<Vec<PictureItem>> {
        progress.report(0, READING_STATUS);
        self.config.validate()?;
        workspace.validate()?;
        let names_col = workspace.names_column()?;
        let links_col = workspace.links_column()?;

        let mut session = WorkbookSession::open(&workspace.workbook.path)?;
        let (entry, data) = session.load_sheet(workspace.selected_sheet_index)?;

        let total = workspace.row_count();
        let mut items = Vec::with_capacity(total);
        let mut edits = SheetEdits::new();
        let mut invalid = Vec::new();

        for (i, row) in workspace.rows().enumerate() {
            let name = picture_name(&data, row, names_col);
            let url = url_from_cell(&data, row, links_col);

            if name.is_none() {
                edits.highlight(row, names_col);
                invalid.push(cell_ref(row, names_col));
            }
            if url.is_none() {
                edits.highlight(row, links_col);
                invalid.push(cell_ref(row, links_col));
            }
            if let (Some(name), Some(url)) = (name, url) {
                items.push(PictureItem::new(name, Some(url)));
            }

            progress.report(progress::percent(i + 1, total), READING_STATUS);
        }

        if !invalid.is_empty() {
            log::warn!(
                "{} invalid cells in sheet '{}', highlighting them",
                invalid.len(),
                entry.name
            );
            session.apply_edits(&entry, &data, &edits, &self.config.output.highlight_color)?;
            session.save()?;
            return Err(SheetError::InvalidData { cells: invalid }.into());
        }

        log::info!("Read {} pictures from sheet '{}'", items.len(), entry.name);
        progress.report(100, READING_STATUS);
        Ok(items)
    }

    /// Write upload results next to the used area of the sheet, in place
    pub fn update_picture_items<P: ProgressReporter + ?Sized>(
        &self,
        items: &[PictureItem],
        workspace: &WorkspaceInfo,
        progress: &mut P,
    ) -> Result<()> {
        self.update_picture_items_as(items, workspace, progress, &workspace.workbook.path)
    }

    /// Write upload results and save the workbook to `output`.
    ///
    /// Each row's name is looked up in `items` (first match). Uploaded items
    /// become hyperlinks showing the configured link text; the others get
    /// their address, or nothing, as plain text. Nothing is written unless
    /// every row resolves.
    pub fn update_picture_items_as<P: ProgressReporter + ?Sized>(
        &self,
        items: &[PictureItem],
        workspace: &WorkspaceInfo,
        progress: &mut P,
        output: &Path,
    ) -> Result<()> {
        progress.report(0, WRITING_STATUS);
        self.config.validate()?;
        workspace.validate()?;
        let names_col = workspace.names_column()?;

        // first column past the used area, as seen when the workspace was taken
        let target_col = workspace.selected_sheet()?.last_cell.column;
        if target_col > MAX_COLUMN {
            return Err(SheetError::InvalidColumn(format!("column {} past XFD", target_col + 1)).into());
        }

        let mut session = WorkbookSession::open(&workspace.workbook.path)?;
        let (entry, data) = session.load_sheet(workspace.selected_sheet_index)?;

        let total = workspace.row_count();
        let mut edits = SheetEdits::new();
        for (i, row) in workspace.rows().enumerate() {
            let cell = cell_ref(row, names_col);
            let name = picture_name(&data, row, names_col)
                .ok_or_else(|| SheetError::MissingPictureName { cell: cell.clone() })?;
            let item = items
                .iter()
                .find(|item| item.name == name)
                .ok_or_else(|| SheetError::UnknownPicture {
                    name: name.clone(),
                    cell,
                })?;

            let address = item.address.as_deref().unwrap_or_default();
            if item.status && !address.is_empty() {
                edits.set_hyperlink(row, target_col, address, self.config.output.link_text.as_str());
            } else {
                if item.status {
                    log::warn!("Picture '{}' is marked uploaded but has no address", name);
                }
                edits.set_text(row, target_col, address);
            }

            progress.report(progress::percent(i + 1, total), WRITING_STATUS);
        }

        session.apply_edits(&entry, &data, &edits, &self.config.output.highlight_color)?;
        session.save_as(output)?;

        log::info!(
            "Wrote {} results to column {} of sheet '{}'",
            total,
            reader::parser_utils::column_letters(target_col),
            entry.name
        );
        progress.report(100, WRITING_STATUS);
        Ok(())
    }
}

impl Default for PictureSheet {
    fn default() -> Self {
        Self::new()
    }
}

/// [`PictureSheet::read_picture_items`] with default settings
pub fn read_picture_items<P: ProgressReporter + ?Sized>(
    workspace: &WorkspaceInfo,
    progress: &mut P,
) -> Result<Vec<PictureItem>> {
    PictureSheet::new().read_picture_items(workspace, progress)
}

/// [`PictureSheet::update_picture_items`] with default settings
pub fn update_picture_items<P: ProgressReporter + ?Sized>(
    items: &[PictureItem],
    workspace: &WorkspaceInfo,
    progress: &mut P,
) -> Result<()> {
    PictureSheet::new().update_picture_items(items, workspace, progress)
}

/// Trimmed text of a name cell, `None` when blank
fn picture_name(data: &reader::SheetData, row: u32, col: u32) -> Option<String> {
    data.value(row, col)
        .display_text()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
