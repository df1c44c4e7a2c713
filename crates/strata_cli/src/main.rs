//! strata CLI
//!
//! Command-line tools for strata store management.
//!
//! # Commands
//!
//! - `get` / `put` / `del` - single-key operations
//! - `inspect` - display the segment table
//! - `verify` - walk every record and check framing and checksums

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// strata command-line store tools.
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
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
    /// Read the value of a key
    Get {
        /// Key to read
        key: String,
    },

    /// Write a key-value pair
    Put {
        /// Key to write
        key: String,

        /// Value to store
        value: String,
    },

    /// Delete a key
    Del {
        /// Key to delete
        key: String,
    },

    /// Display the segment table
    Inspect,

    /// Verify record framing and checksums across all segments
    Verify,

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Get { key } => {
            let path = require_path(cli.path)?;
            commands::kv::get(&path, &key)?;
        }
        Commands::Put { key, value } => {
            let path = require_path(cli.path)?;
            commands::kv::put(&path, &key, &value)?;
        }
        Commands::Del { key } => {
            let path = require_path(cli.path)?;
            commands::kv::del(&path, &key)?;
        }
        Commands::Inspect => {
            let path = require_path(cli.path)?;
            commands::inspect::run(&path)?;
        }
        Commands::Verify => {
            let path = require_path(cli.path)?;
            commands::verify::run(&path)?;
        }
        Commands::Version => {
            println!("strata CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("strata core v{}", strata_core::VERSION);
        }
    }

    Ok(())
}

fn require_path(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    path.ok_or_else(|| anyhow::anyhow!("store path required (--path)"))
}
