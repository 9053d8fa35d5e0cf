//! Configuration for picture sheet operations

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::reader::parser_utils::{MAX_ROW, column_index};

/// Main configuration, usually loaded from `picsheet.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PicsheetConfig {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl PicsheetConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: PicsheetConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the values that do not depend on a particular workbook
    pub fn validate(&self) -> Result<()> {
        let ws = &self.workspace;
        for (key, column) in [
            ("names_column", &ws.names_column),
            ("links_column", &ws.links_column),
        ] {
            if let Some(column) = column {
                if column_index(column).is_none() {
                    bail!("workspace.{} = '{}' is not a column between A and XFD", key, column);
                }
            }
        }

        if ws.sheet == Some(0) {
            bail!("workspace.sheet is 1-based");
        }
        if let (Some(first), Some(last)) = (ws.first_row, ws.last_row) {
            if first > last {
                bail!("workspace.first_row ({}) is after last_row ({})", first, last);
            }
        }
        for row in [ws.first_row, ws.last_row].into_iter().flatten() {
            if row == 0 || row > MAX_ROW {
                bail!("Row {} is outside 1..={}", row, MAX_ROW);
            }
        }

        if self.output.link_text.trim().is_empty() {
            bail!("output.link_text must not be empty");
        }
        if !is_argb(&self.output.highlight_color) {
            bail!(
                "output.highlight_color '{}' must be 8 hex digits (AARRGGBB)",
                self.output.highlight_color
            );
        }
        Ok(())
    }
}

/// Default location of the picture table; every field may be given on the
/// command line instead
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// 1-based sheet index
    pub sheet: Option<u32>,
    pub first_row: Option<u32>,
    pub last_row: Option<u32>,
    pub names_column: Option<String>,
    pub links_column: Option<String>,
}

/// How results and marks are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Text shown in cells holding an uploaded picture link
    #[serde(default = "default_link_text")]
    pub link_text: String,
    /// ARGB fill for cells with missing or invalid data
    #[serde(default = "default_highlight_color")]
    pub highlight_color: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            link_text: default_link_text(),
            highlight_color: default_highlight_color(),
        }
    }
}

fn default_link_text() -> String {
    "Photo".to_string()
}

fn default_highlight_color() -> String {
    "FFFF0000".to_string()
}

fn is_argb(color: &str) -> bool {
    color.len() == 8 && color.chars().all(|c| c.is_ascii_hexdigit())
}
