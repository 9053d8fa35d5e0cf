//! Domain errors callers may want to tell apart

use thiserror::Error;

/// Errors raised by picture sheet operations.
///
/// Library functions return `anyhow::Result`; these values can be recovered
/// with `err.downcast_ref::<SheetError>()`.
#[derive(Debug, Error)]
pub enum SheetError {
    /// Empty name cells or missing/invalid hyperlinks; the cells were highlighted and saved
    #[error(
        "Errors found in the table: empty cells in the picture name column, or empty/invalid hyperlinks ({}). \
         The cells are highlighted in the file. Fix them and try again",
        .cells.join(", ")
    )]
    InvalidData { cells: Vec<String> },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Sheet index {index} is out of range (workbook has {count} sheets)")]
    SheetIndexOutOfRange { index: u32, count: usize },

    #[error("Sheet '{0}' is not a worksheet")]
    NotAWorksheet(String),

    #[error("Invalid column '{0}'")]
    InvalidColumn(String),

    #[error("Invalid row range {begin}..{end}")]
    InvalidRowRange { begin: u32, end: u32 },

    #[error("Picture name cell {cell} is empty")]
    MissingPictureName { cell: String },

    #[error("No upload result for picture '{name}' (cell {cell})")]
    UnknownPicture { name: String, cell: String },

    #[error("Missing required part: {0}")]
    MissingPart(String),
}
