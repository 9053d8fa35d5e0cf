//! Output formatters for workbook info and picture items

use anyhow::Result;
use colored::*;
use picsheet_core::{PictureItem, SheetKind, WorkbookInfo};
use std::path::Path;

/// Print sheets in human-readable format
pub fn print_info_human(info: &WorkbookInfo) {
    println!("{}", format!("Workbook: {}", info.path.display()).bold());
    println!();

    for sheet in &info.sheets {
        let kind = match sheet.kind {
            SheetKind::Worksheet => String::new(),
            SheetKind::Chartsheet => format!(" {}", "(chart)".bright_black()),
        };
        println!(
            "  {:>3}  {}{}  last cell: row {}, column {}",
            sheet.index,
            sheet.name.cyan().bold(),
            kind,
            sheet.last_cell.row,
            sheet.last_cell.column
        );
    }
}

/// Print sheets in JSON format
pub fn print_info_json(info: &WorkbookInfo) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(info)?);
    Ok(())
}

pub fn print_items_human(file_path: &Path, items: &[PictureItem]) {
    println!("{}", format!("Pictures in: {}", file_path.display()).bold());
    println!();

    for item in items {
        println!(
            "  {} {}",
            item.name.yellow(),
            item.address.as_deref().unwrap_or_default()
        );
    }

    println!();
    println!(
        "{}",
        format!("✓ {} pictures, all rows valid", items.len())
            .green()
            .bold()
    );
}

pub fn print_items_json(file_path: &Path, items: &[PictureItem]) -> Result<()> {
    let output = serde_json::json!({
        "file": file_path.display().to_string(),
        "valid": true,
        "items": items,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Report cells that were highlighted because of missing or invalid data
pub fn print_invalid_human(file_path: &Path, cells: &[String]) {
    println!("{}", format!("Pictures in: {}", file_path.display()).bold());
    println!();
    println!(
        "{} {} cells have an empty picture name or an empty/invalid hyperlink:",
        "ERROR".red().bold(),
        cells.len()
    );
    for cell in cells {
        println!("  {} {}", "Cell:".bold(), cell.yellow());
    }
    println!();
    println!("The cells are highlighted in the file. Fix them and try again.");
}

pub fn print_invalid_json(file_path: &Path, cells: &[String]) -> Result<()> {
    let output = serde_json::json!({
        "file": file_path.display().to_string(),
        "valid": false,
        "invalid_cells": cells,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
