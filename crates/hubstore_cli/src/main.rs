//! Hubstore CLI
//!
//! Command-line tools for block file directories.
//!
//! # Commands
//!
//! - `inspect` - Display per-table statistics and the block count
//! - `verify` - Check index and segment consistency without repairing
//! - `get` - Print one column of one block as hex
//! - `truncate` - Roll the store back to a block count

mod commands;

use clap::{Parser, Subcommand};
use commands::CliError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Hubstore block file maintenance tools.
#[derive(Parser)]
#[command(name = "hubstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the block file directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display per-table statistics and the block count
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check index and segment consistency without repairing
    Verify {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print one column of one block as hex
    Get {
        /// Table name (hashes, bodies, transactions, receipts, interchain)
        #[arg(short, long)]
        table: String,

        /// Block number, starting at 1
        #[arg(short, long)]
        number: u64,
    },

    /// Roll the store back to a block count
    Truncate {
        /// Number of blocks to keep
        #[arg(short, long)]
        blocks: u64,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or(CliError::MissingPath("inspect"))?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify { format } => {
            let path = cli.path.ok_or(CliError::MissingPath("verify"))?;
            commands::verify::run(&path, &format)?;
        }
        Commands::Get { table, number } => {
            let path = cli.path.ok_or(CliError::MissingPath("get"))?;
            commands::get::run(&path, &table, number)?;
        }
        Commands::Truncate { blocks } => {
            let path = cli.path.ok_or(CliError::MissingPath("truncate"))?;
            commands::truncate::run(&path, blocks)?;
        }
        Commands::Version => {
            println!("Hubstore CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Hubstore block file v{}", hubstore_blockfile::VERSION);
        }
    }

    Ok(())
}
