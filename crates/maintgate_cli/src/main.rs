//! maintgate CLI
//!
//! Operator tools for a file-backed maintenance flag store.
//!
//! # Commands
//!
//! - `inspect` - List blocked tables
//! - `block` - Suspend maintenance on a table
//! - `unblock` - Resume maintenance on a table
//! - `unblock-all` - Clear every block, as a controller does at start-up
//!
//! The store directory is locked while a coordinator owns it, so these
//! commands only run against stores no live node is using.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// maintgate flag store tools.
#[derive(Parser)]
#[command(name = "maintgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the flag store directory
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
    /// List blocked tables
    Inspect {
        /// Also report the status of this table
        #[arg(short, long)]
        table: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Suspend maintenance on a table
    Block {
        /// Table id
        table: u64,
    },

    /// Resume maintenance on a table
    Unblock {
        /// Table id
        table: u64,
    },

    /// Clear every maintenance block
    UnblockAll {
        /// Dry run - list the blocks without clearing them
        #[arg(short, long)]
        dry_run: bool,
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
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { table, format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, table, &format)?;
        }
        Commands::Block { table } => {
            let path = cli.path.ok_or("Store path required for block")?;
            commands::block::run(&path, table)?;
        }
        Commands::Unblock { table } => {
            let path = cli.path.ok_or("Store path required for unblock")?;
            commands::unblock::run(&path, table)?;
        }
        Commands::UnblockAll { dry_run } => {
            let path = cli.path.ok_or("Store path required for unblock-all")?;
            commands::unblock_all::run(&path, dry_run)?;
        }
        Commands::Version => {
            println!("maintgate CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("maintgate core v{}", maintgate_core::VERSION);
        }
    }

    Ok(())
}
