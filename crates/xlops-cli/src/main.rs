//! xlops CLI - cell reference helpers and Excel workbook queries

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use xlops_core::{column_index_to_letters, letters_to_column_index, CellReference, RangeReference};
use xlops_excel_com::{ExcelBridge, ExcelBridgeConfig, MatchMode, Workbook};

#[derive(Parser)]
#[command(name = "xlops")]
#[command(author, version, about = "Cell reference and Excel automation tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the A1 address of a 1-based row and column
    Cell {
        /// Row number (1-based)
        row: u32,

        /// Column number (1-based)
        column: u32,
    },

    /// Print the letters of a 1-based column index
    Column {
        /// Column number (1-based)
        index: u32,
    },

    /// Print the 1-based index of a column given by letters
    Index {
        /// Column letters, e.g. "AB"
        letters: String,
    },

    /// Check that an address names a single cell
    Check {
        /// Address to validate, e.g. "B7"
        address: String,
    },

    /// List all sheets in a workbook
    Sheets {
        /// Workbook file
        input: PathBuf,

        #[command(flatten)]
        bridge: BridgeArgs,
    },

    /// Read the value of one cell
    Read {
        /// Workbook file
        input: PathBuf,

        /// Cell address, e.g. "C4"
        cell: String,

        /// Sheet to read from (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        #[command(flatten)]
        bridge: BridgeArgs,
    },

    /// Find the first cell in a range holding a keyword
    Find {
        /// Workbook file
        input: PathBuf,

        /// Range to search, e.g. "B2:E5" or "C:C"
        range: String,

        /// Text to look for
        keyword: String,

        /// Match the keyword anywhere in a cell instead of the whole cell
        #[arg(short, long)]
        partial: bool,

        /// Sheet to search (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        #[command(flatten)]
        bridge: BridgeArgs,
    },
}

/// Options for starting the Excel bridge under WINE.
#[derive(Args)]
struct BridgeArgs {
    /// WINE executable
    #[arg(long, default_value = "wine")]
    wine: PathBuf,

    /// WINEPREFIX holding the Excel installation
    #[arg(long)]
    wine_prefix: Option<PathBuf>,

    /// Path to xlops-com-bridge.exe (default: search next to this binary)
    #[arg(long)]
    bridge_exe: Option<PathBuf>,

    /// Seconds to wait for each bridge response
    #[arg(long, default_value = "30")]
    timeout_secs: u64,
}

impl BridgeArgs {
    fn start(self) -> Result<ExcelBridge> {
        let config = ExcelBridgeConfig {
            bridge_exe_path: self.bridge_exe,
            wine_path: self.wine,
            wine_prefix: self.wine_prefix,
            timeout: Duration::from_secs(self.timeout_secs),
            // Paths given on the command line are relative to the shell
            base_dir: Some(std::env::current_dir().context("Failed to read current directory")?),
        };
        ExcelBridge::start(config).context("Failed to start the Excel bridge")
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Cell { row, column } => {
            let cell = CellReference::from_row_column(row, column)?;
            println!("{cell}");
        }
        Commands::Column { index } => {
            if index == 0 {
                bail!("Column index must be >= 1");
            }
            println!("{}", column_index_to_letters(index));
        }
        Commands::Index { letters } => {
            println!("{}", letters_to_column_index(&letters)?);
        }
        Commands::Check { address } => {
            let cell = CellReference::from_address(&address)
                .with_context(|| format!("'{address}' is not a single cell"))?;
            println!(
                "{cell}\tcolumn {}\trow {}",
                cell.column_letters(),
                cell.row_digits()
            );
        }
        Commands::Sheets { input, bridge } => {
            let bridge = bridge.start()?;
            list_sheets(&bridge, &input)?;
            bridge.shutdown().context("Failed to shut down Excel")?;
        }
        Commands::Read {
            input,
            cell,
            sheet,
            bridge,
        } => {
            let cell = CellReference::from_address(&cell)?;
            let bridge = bridge.start()?;
            read_cell(&bridge, &input, &cell, sheet.as_deref())?;
            bridge.shutdown().context("Failed to shut down Excel")?;
        }
        Commands::Find {
            input,
            range,
            keyword,
            partial,
            sheet,
            bridge,
        } => {
            let mode = if partial {
                MatchMode::Partial
            } else {
                MatchMode::Whole
            };
            let range = RangeReference::from_address(range);
            let bridge = bridge.start()?;
            find_keyword(&bridge, &input, &range, &keyword, mode, sheet.as_deref())?;
            bridge.shutdown().context("Failed to shut down Excel")?;
        }
    }

    Ok(())
}

fn open<'a>(bridge: &'a ExcelBridge, input: &Path, sheet: Option<&str>) -> Result<Workbook<'a>> {
    let mut workbook = bridge
        .open_workbook(input)
        .with_context(|| format!("Failed to open '{}'", input.display()))?;
    if let Some(name) = sheet {
        workbook
            .select_sheet(name)
            .with_context(|| format!("No sheet named '{name}' in '{}'", input.display()))?;
    }
    Ok(workbook)
}

fn list_sheets(bridge: &ExcelBridge, input: &Path) -> Result<()> {
    let workbook = open(bridge, input, None)?;
    let names = workbook.sheet_names().context("Failed to list sheets")?;

    for (i, name) in names.iter().enumerate() {
        println!("{}\t{}", i, name);
    }

    workbook.close().context("Failed to close workbook")
}

fn read_cell(
    bridge: &ExcelBridge,
    input: &Path,
    cell: &CellReference,
    sheet: Option<&str>,
) -> Result<()> {
    let workbook = open(bridge, input, sheet)?;
    let value = workbook
        .read_value(cell)
        .with_context(|| format!("Failed to read {cell}"))?;

    println!("{value}");

    workbook.close().context("Failed to close workbook")
}

fn find_keyword(
    bridge: &ExcelBridge,
    input: &Path,
    range: &RangeReference,
    keyword: &str,
    mode: MatchMode,
    sheet: Option<&str>,
) -> Result<()> {
    let workbook = open(bridge, input, sheet)?;
    let found = workbook
        .find(range, keyword, mode)
        .with_context(|| format!("Failed to search {range}"))?;

    match found {
        Some(cell) => {
            let address = CellReference::from_row_column(cell.row, cell.column)?;
            println!("{address}\trow {}\tcolumn {}", cell.row, cell.column);
        }
        None => eprintln!("'{keyword}' not found in {range}"),
    }

    workbook.close().context("Failed to close workbook")
}
