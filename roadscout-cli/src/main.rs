//! RoadScout CLI - command-line interface
//!
//! This binary drives the roadscout library: it processes curated road
//! definitions through the acquisition pipeline and manages the geometry
//! cache.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::cache::CacheAction;
use commands::process::ProcessArgs;

#[derive(Debug, Parser)]
#[command(
    name = "roadscout",
    version,
    about = "Road geometry acquisition and motorcycling metrics pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Process roads from a definitions file
    Process(ProcessArgs),
    /// Inspect or clear the geometry cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
        /// Geometry cache directory (defaults to the platform cache dir).
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    roadscout::logging::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Process(args) => commands::process::run(args),
        Command::Cache { action, cache_dir } => commands::cache::run(action, cache_dir),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
