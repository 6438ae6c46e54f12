//! # govpipe CLI Entry Point
//!
//! Parses arguments, initializes tracing, and dispatches to subcommand
//! handlers in the `govpipe_cli` library crate.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use govpipe_cli::batch::{run_batch, BatchArgs};
use govpipe_cli::checksum::{run_checksum, ChecksumArgs};
use govpipe_cli::process::{run_process, ProcessArgs};

/// Deterministic decision pipeline for governance documents.
///
/// Parses a document with failover, asks the decision service (or the local
/// fallback), applies deterministic rules, gates the blended confidence,
/// and writes one audit record per run.
#[derive(Parser, Debug)]
#[command(name = "govpipe", version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    /// Pipeline configuration (YAML). Defaults apply when omitted.
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one document through the pipeline.
    Process(ProcessArgs),
    /// Run a file of documents concurrently.
    Batch(BatchArgs),
    /// Print the content checksum of files.
    Checksum(ChecksumArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // Logs go to stderr; stdout carries results.
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "govpipe starting");

    let config = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Process(args) => run_process(args, config),
        Commands::Batch(args) => run_batch(args, config),
        Commands::Checksum(args) => run_checksum(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(govpipe_cli::exit::ERROR)
        }
    }
}
