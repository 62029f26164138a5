//! Variant annotator worker main executable.

pub mod annos;
pub mod common;
pub mod ingest;
pub mod model;
pub mod search;
pub mod store;

use clap::{Args, Parser, Subcommand};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version = common::VERSION,
    about = "Variant file ingestion and annotation",
    long_about = "This tool ingests per-patient variant files, annotates them \
    via VariantValidator and ClinVar, and records the result in a SQLite database"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Ingest a patient variant file.
    Ingest(ingest::Args),
    /// Search the variant database.
    Search(search::Args),
    /// Database-related commands.
    Db(Db),
}

/// Parsing of "db *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Db {
    /// The sub command to run
    #[command(subcommand)]
    command: DbCommands,
}

/// Enum supporting the parsing of "db *" sub commands.
#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Initialize the database schema.
    Init(store::InitArgs),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector and go into sub commands.
    tracing::subscriber::with_default(collector, || {
        tracing::info!("variant-annotator {} starting", common::VERSION);
        match &cli.command {
            Commands::Ingest(args) => {
                ingest::run(&cli.common, args)?;
            }
            Commands::Search(args) => {
                search::run(&cli.common, args)?;
            }
            Commands::Db(db) => match &db.command {
                DbCommands::Init(args) => {
                    store::run_init(&cli.common, args)?;
                }
            },
        }

        Ok::<(), anyhow::Error>(())
    })?;

    tracing::info!("All done. Have a nice day!");

    Ok(())
}
