mod commands;
mod output;

use clap::{Parser, Subcommand};
use ledgerlens_core::model::DocumentType;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ledgerlens",
    version,
    about = "Extract balance-sheet line items and figures from financial documents"
)]
struct Cli {
    /// Log fallback attempts and back-end decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a document (PDF, XLSX/XLS, CSV, XML or XBRL) into chunks, tables and figures
    Parse {
        /// Path to the document
        input_file: PathBuf,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Write the parsing result to a JSON file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,

        /// JSON parser config (defaults are used for missing keys)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Expected document type, e.g. balance_sheet, annual_report, 10k
        #[arg(long, value_name = "TYPE", value_parser = commands::parse::parse_document_type)]
        document_type: Option<DocumentType>,

        /// Company the document belongs to
        #[arg(long)]
        company: Option<String>,

        /// Fiscal period, e.g. FY2023
        #[arg(long, value_name = "PERIOD")]
        period: Option<String>,
    },
    /// List supported formats and the external tools the PDF back-end uses
    Formats,
    /// Print the default parser config, or validate a config file
    Config {
        /// Config file to validate
        #[arg(long, value_name = "FILE")]
        validate: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Parse {
            input_file,
            output,
            out,
            config,
            document_type,
            company,
            period,
        } => commands::parse::run(commands::parse::ParseArgs {
            input_file,
            output_format: output,
            output_file: out,
            config_file: config,
            document_type,
            company,
            period,
        }),
        Commands::Formats => commands::formats::list(),
        Commands::Config { validate } => match validate {
            Some(file) => commands::config::validate(&file),
            None => commands::config::defaults(),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
