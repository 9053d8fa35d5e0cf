//! Workbook sessions: one opened package per process at a time

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use url::Url;

use crate::error::SheetError;
use crate::reader::package::Package;
use crate::reader::xlsx_parser::SheetEntry;
use crate::reader::{
    CalamineReader, SheetData, SheetKind, WorkbookFormat, WorkbookInfo, WorkbookReader,
    XlsxReader,
};
use crate::writer::{self, SheetEdits};

static SESSION_LOCK: Mutex<()> = Mutex::new(());

/// Block until no other session is live. A poisoned lock is taken over.
fn lock_session() -> MutexGuard<'static, ()> {
    SESSION_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// An opened xlsx/xlsm package.
///
/// Holding a session keeps every other session in the process waiting; the
/// lock is released when the session is dropped.
pub struct WorkbookSession {
    path: PathBuf,
    package: Package,
    _guard: MutexGuard<'static, ()>,
}

impl WorkbookSession {
    /// Open a workbook that can be written back
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if WorkbookFormat::detect(path)? != WorkbookFormat::Ooxml {
            return Err(SheetError::UnsupportedFormat(path.display().to_string()).into());
        }

        let guard = lock_session();
        let package = Package::open(path)?;
        log::debug!("Opened session for {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            package,
            _guard: guard,
        })
    }

    pub fn workbook_info(&self) -> Result<WorkbookInfo> {
        let mut reader = XlsxReader::new(&self.package)?;
        let mut info = WorkbookInfo::new(&self.path);
        info.sheets = reader.read_sheet_infos()?;
        Ok(info)
    }

    /// Locate a worksheet by 1-based index and parse it
    pub fn load_sheet(&self, index: u32) -> Result<(SheetEntry, SheetData)> {
        let mut reader = XlsxReader::new(&self.package)?;
        let entries = reader.sheet_entries()?;
        let count = entries.len();

        let entry = entries
            .into_iter()
            .find(|e| e.index == index)
            .ok_or(SheetError::SheetIndexOutOfRange { index, count })?;
        if entry.kind != SheetKind::Worksheet {
            return Err(SheetError::NotAWorksheet(entry.name).into());
        }

        let data = reader.read_sheet(&entry)?;
        Ok((entry, data))
    }

    pub fn apply_edits(
        &mut self,
        entry: &SheetEntry,
        data: &SheetData,
        edits: &SheetEdits,
        highlight_color: &str,
    ) -> Result<()> {
        writer::apply_sheet_edits(&mut self.package, entry, data, edits, highlight_color)
    }

    /// Save over the opened file
    pub fn save(&self) -> Result<()> {
        self.save_as(&self.path)
    }

    pub fn save_as<P: AsRef<Path>>(&self, output: P) -> Result<()> {
        writer::save_package(&self.package, output.as_ref())
    }
}

impl Drop for WorkbookSession {
    fn drop(&mut self) {
        log::debug!("Closed session for {}", self.path.display());
    }
}

/// Read sheet names, indexes and last used cells.
///
/// xlsx/xlsm are parsed directly; xls, xlsb and ods go through calamine.
pub fn read_workbook_info<P: AsRef<Path>>(path: P) -> Result<WorkbookInfo> {
    let path = path.as_ref();
    match WorkbookFormat::detect(path)? {
        WorkbookFormat::Ooxml => WorkbookSession::open(path)?.workbook_info(),
        WorkbookFormat::Legacy => {
            let _guard = lock_session();
            let mut reader = CalamineReader::open(path)?;
            let mut info = WorkbookInfo::new(path);
            info.sheets = reader.read_sheet_infos()?;
            Ok(info)
        }
    }
}

/// Address held by a cell: the external target of a hyperlink covering it,
/// otherwise its text when that parses as an absolute URL
pub fn url_from_cell(data: &SheetData, row: u32, col: u32) -> Option<String> {
    let linked = data
        .hyperlinks
        .iter()
        .filter(|h| h.contains(row, col))
        .find_map(|h| h.target.clone());
    if linked.is_some() {
        return linked;
    }

    let text = data.value(row, col).display_text()?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Url::parse(text).ok().map(|_| text.to_string())
}
