//! examtally CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "examtally",
    version,
    about = "Exam export normalization, scoring and reporting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate an export and write reports
    Run {
        /// Exam export JSON
        #[arg(long)]
        input: PathBuf,

        /// Question catalog JSON (default: config, then built-in)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Directory of reviewed <userId>/answers.csv grade sheets
        #[arg(long)]
        grades: Option<PathBuf>,

        /// Output directory (default: output_dir from config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output formats: json, csv, html, all
        #[arg(long, default_value = "all")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print score statistics for an export
    Score {
        /// Exam export JSON
        #[arg(long)]
        input: PathBuf,

        /// Question catalog JSON
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Directory of reviewed grade sheets
        #[arg(long)]
        grades: Option<PathBuf>,

        /// Output format: text, json, table
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Append per-user standard-question accuracy to a CSV file
    Accuracy {
        /// Exam export JSON
        #[arg(long)]
        input: PathBuf,

        /// Question catalog JSON
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Directory of reviewed grade sheets
        #[arg(long)]
        grades: Option<PathBuf>,

        /// CSV file to append to
        #[arg(long)]
        output: PathBuf,

        /// Start the file over instead of appending
        #[arg(long)]
        truncate: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Transcribe audio answers into the export
    Transcribe {
        /// Exam export JSON
        #[arg(long)]
        input: PathBuf,

        /// Where to write the enriched export
        #[arg(long)]
        output: PathBuf,

        /// Re-transcribe answers that already have a transcript
        #[arg(long)]
        force: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate a question catalog
    Validate {
        /// Catalog JSON (default: the built-in catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Create a starter config and catalog
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("examtally=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            input,
            catalog,
            grades,
            output,
            format,
            config,
        } => commands::run::execute(input, catalog, grades, output, format, config),
        Commands::Score {
            input,
            catalog,
            grades,
            format,
            config,
        } => commands::score::execute(input, catalog, grades, format, config),
        Commands::Accuracy {
            input,
            catalog,
            grades,
            output,
            truncate,
            config,
        } => commands::accuracy::execute(input, catalog, grades, output, truncate, config),
        Commands::Transcribe {
            input,
            output,
            force,
            config,
        } => commands::transcribe::execute(input, output, force, config).await,
        Commands::Validate { catalog } => commands::validate::execute(catalog),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
