use anyhow::Context;
use clap::{Parser, Subcommand};
use royalbit_sheetbridge::cli::{self, CellEdit};
use royalbit_sheetbridge::config::{BridgeConfig, ConverterBackend};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sheetbridge")]
#[command(about = "Edit CSV, TSV and spreadsheet files as tables, saved back in their own format.")]
#[command(long_about = "SheetBridge - round-trip tabular editing

Delimited text (comma, tab or space separated) is edited losslessly.
Spreadsheets (.xlsx, .xls, .ods) are converted to CSV for editing and
converted back on save; formatting, formulas and extra sheets are lost,
so you are asked to confirm first.

COMMANDS:
  inspect  - Classify a file and show how it would be edited
  cat      - Print the table as it would be saved
  set      - Change cells and save
  detect   - Detect the separator of a text file

CONVERTERS:
  ssconvert   (default) Gnumeric's ssconvert
  libreoffice LibreOffice in headless mode
  builtin     In-process; reads xlsx/xls/ods, writes xlsx only
  custom      converter.program + converter.args from the config file

EXAMPLES:
  sheetbridge inspect data.csv
  sheetbridge set data.csv --cell 1:0=42
  sheetbridge --converter builtin set report.xlsx --cell 2:3=done --yes

Config: ~/.config/sheetbridge/config.yaml")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ~/.config/sheetbridge/config.yaml)
    #[arg(long, global = true, env = "SHEETBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Conversion backend: ssconvert, libreoffice, builtin or custom
    #[arg(long, global = true, env = "SHEETBRIDGE_CONVERTER")]
    converter: Option<ConverterBackend>,

    /// Header lines skipped by separator detection
    #[arg(long, global = true)]
    header_lines: Option<usize>,

    /// Conversion timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a file and show how it would be edited
    Inspect {
        /// File to inspect
        file: PathBuf,

        /// Accept the spreadsheet conversion prompt
        #[arg(short, long)]
        yes: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the table as it would be saved
    Cat {
        /// File to print
        file: PathBuf,

        /// Accept the spreadsheet conversion prompt
        #[arg(short, long)]
        yes: bool,
    },

    #[command(long_about = "Change cells and save the file in its original format.

Cells are addressed as ROW:COL=VALUE, zero-based, header row included.
A column one past the widest row appends a column.

For spreadsheets the edited CSV is converted back over the original file.
If any step fails the original file is left untouched.

EXAMPLES:
  sheetbridge set data.csv --cell 1:0=42 --cell 1:1=\"hello, world\"
  sheetbridge set report.xlsx --cell 0:4=total --yes")]
    /// Change cells and save
    Set {
        /// File to edit
        file: PathBuf,

        /// Cell edit as ROW:COL=VALUE (repeatable)
        #[arg(short, long = "cell", value_name = "ROW:COL=VALUE")]
        cells: Vec<CellEdit>,

        /// Accept the spreadsheet conversion prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Detect the separator of a text file
    Detect {
        /// Delimited text file
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli::init_logging(cli.verbose);

    let mut config = BridgeConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(backend) = cli.converter {
        config.converter.backend = backend;
    }
    if let Some(header_lines) = cli.header_lines {
        config.header_lines = header_lines;
    }
    if let Some(timeout) = cli.timeout {
        config.converter.timeout_secs = timeout;
    }

    match cli.command {
        Commands::Inspect { file, yes, json } => cli::inspect(file, &config, yes, json)?,
        Commands::Cat { file, yes } => cli::cat(file, &config, yes)?,
        Commands::Set { file, cells, yes } => cli::set(file, cells, &config, yes, cli.verbose)?,
        Commands::Detect { file } => cli::detect(file, &config)?,
    }
    Ok(())
}
