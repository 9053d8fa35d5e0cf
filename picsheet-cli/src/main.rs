use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use picsheet_core::reader::parser_utils::column_letters;
use picsheet_core::{
    PicsheetConfig, PictureItem, PictureSheet, SheetError, WorkspaceInfo, read_workbook_info,
};
use std::fs;
use std::path::{Path, PathBuf};

mod formatter;

#[derive(Parser)]
#[command(name = "picsheet")]
#[command(about = "Read picture lists from Excel workbooks and write upload results back", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the sheets of a workbook with their last used cell
    Info {
        /// Path to the Excel/ODS file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    /// Read and validate the picture table; invalid cells are highlighted in the file
    Read {
        /// Path to the xlsx/xlsm file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        workspace: WorkspaceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Also save the items as JSON, ready for the uploader
        #[arg(long, value_name = "PATH")]
        items_out: Option<PathBuf>,
    },
    /// Write upload results into the first free column
    Write {
        /// Path to the xlsx/xlsm file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// JSON array of picture items with their upload status
        #[arg(long, value_name = "ITEMS")]
        results: PathBuf,

        #[command(flatten)]
        workspace: WorkspaceArgs,

        /// Output file (defaults to updating FILE in place)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show what would be done without making changes
        #[arg(long)]
        dry_run: bool,
    },
}

/// Location of the picture table; overrides the config file
#[derive(Args)]
struct WorkspaceArgs {
    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// 1-based sheet index
    #[arg(long, value_name = "INDEX")]
    sheet: Option<u32>,

    /// Rows of the picture table, e.g. 2:40
    #[arg(long, value_name = "FIRST:LAST", value_parser = parse_rows)]
    rows: Option<(u32, u32)>,

    /// Column with picture names
    #[arg(long, value_name = "COL")]
    names: Option<String>,

    /// Column with picture hyperlinks
    #[arg(long, value_name = "COL")]
    links: Option<String>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON output
    Json,
}

fn parse_rows(s: &str) -> Result<(u32, u32), String> {
    let (first, last) = s
        .split_once(':')
        .ok_or_else(|| format!("expected FIRST:LAST, got '{s}'"))?;
    let first = first
        .trim()
        .parse()
        .map_err(|_| format!("invalid first row '{first}'"))?;
    let last = last
        .trim()
        .parse()
        .map_err(|_| format!("invalid last row '{last}'"))?;
    Ok((first, last))
}

fn load_config(path: Option<&Path>) -> Result<PicsheetConfig> {
    if let Some(config_path) = path {
        return PicsheetConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()));
    }

    // Try to load default config from current directory if it exists
    let default_config_path = PathBuf::from("picsheet.toml");
    if default_config_path.exists() {
        log::debug!("Using {}", default_config_path.display());
        PicsheetConfig::from_file(&default_config_path).with_context(|| {
            format!(
                "Failed to load config from {}",
                default_config_path.display()
            )
        })
    } else {
        Ok(PicsheetConfig::default())
    }
}

/// Merge command-line values over the config file
fn build_workspace(file: &Path, args: &WorkspaceArgs, config: &PicsheetConfig) -> Result<WorkspaceInfo> {
    let defaults = &config.workspace;
    let workbook = read_workbook_info(file)
        .with_context(|| format!("Failed to read workbook: {}", file.display()))?;

    let selected_sheet_index = args.sheet.or(defaults.sheet).unwrap_or(1);
    let (row_begin, row_end) = match args.rows {
        Some(rows) => rows,
        None => {
            let first = defaults
                .first_row
                .context("No rows given: use --rows or set workspace.first_row")?;
            // without an explicit end, read down to the last used row
            let last = match defaults.last_row {
                Some(last) => last,
                None => workbook
                    .sheet(selected_sheet_index)
                    .map(|s| s.last_cell.row)
                    .unwrap_or(first),
            };
            (first, last)
        }
    };

    let column_picture_names = args
        .names
        .clone()
        .or_else(|| defaults.names_column.clone())
        .context("No picture name column: use --names or set workspace.names_column")?;
    let column_picture_hyperlinks = args
        .links
        .clone()
        .or_else(|| defaults.links_column.clone())
        .context("No hyperlink column: use --links or set workspace.links_column")?;

    let workspace = WorkspaceInfo {
        workbook,
        selected_sheet_index,
        row_begin,
        row_end,
        column_picture_names,
        column_picture_hyperlinks,
    };
    workspace.validate()?;
    Ok(workspace)
}

fn log_progress(percent: u8, status: &str) {
    log::debug!("{status}: {percent}%");
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Info { file, format } => {
            let info = read_workbook_info(&file)
                .with_context(|| format!("Failed to read workbook: {}", file.display()))?;
            match format {
                OutputFormat::Human => formatter::print_info_human(&info),
                OutputFormat::Json => formatter::print_info_json(&info)?,
            }
        }
        Command::Read {
            file,
            workspace,
            format,
            items_out,
        } => {
            let config = load_config(workspace.config.as_deref())?;
            let ws = build_workspace(&file, &workspace, &config)?;
            let picsheet = PictureSheet::with_config(config);

            let items = match picsheet.read_picture_items(&ws, &mut log_progress) {
                Ok(items) => items,
                Err(err) => {
                    let Some(SheetError::InvalidData { cells }) = err.downcast_ref::<SheetError>()
                    else {
                        return Err(err.context(format!("Failed to read pictures: {}", file.display())));
                    };
                    match format {
                        OutputFormat::Human => formatter::print_invalid_human(&file, cells),
                        OutputFormat::Json => formatter::print_invalid_json(&file, cells)?,
                    }
                    std::process::exit(1);
                }
            };

            if let Some(path) = &items_out {
                fs::write(path, serde_json::to_string_pretty(&items)?)
                    .with_context(|| format!("Failed to write items to {}", path.display()))?;
                log::info!("Saved {} items to {}", items.len(), path.display());
            }

            match format {
                OutputFormat::Human => formatter::print_items_human(&file, &items),
                OutputFormat::Json => formatter::print_items_json(&file, &items)?,
            }
        }
        Command::Write {
            file,
            results,
            workspace,
            output,
            dry_run,
        } => {
            let config = load_config(workspace.config.as_deref())?;
            let ws = build_workspace(&file, &workspace, &config)?;

            let content = fs::read_to_string(&results)
                .with_context(|| format!("Failed to read results from {}", results.display()))?;
            let items: Vec<PictureItem> = serde_json::from_str(&content)
                .with_context(|| format!("Invalid results file: {}", results.display()))?;
            if items.is_empty() {
                bail!("Results file {} has no items", results.display());
            }

            let target = ws.selected_sheet()?;
            let column = column_letters(target.last_cell.column);
            let output_path = output.unwrap_or_else(|| file.clone());

            if dry_run {
                let uploaded = items.iter().filter(|i| i.status).count();
                println!("[DRY RUN] Writing results to '{}':", file.display());
                println!("  Sheet: {} (#{})", target.name, target.index);
                println!("  Rows: {}..={}", ws.row_begin, ws.row_end);
                println!("  Column: {}", column);
                println!(
                    "  Items: {} uploaded, {} failed",
                    uploaded,
                    items.len() - uploaded
                );
                println!("\nOutput would be: {}", output_path.display());
                return Ok(());
            }

            println!("Writing results to '{}'...", file.display());
            PictureSheet::with_config(config)
                .update_picture_items_as(&items, &ws, &mut log_progress, &output_path)
                .with_context(|| "Failed to write results")?;

            println!("✓ Results written to column {}", column);
            println!("Output: {}", output_path.display());
        }
    }

    Ok(())
}
