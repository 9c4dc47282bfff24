//! docvault CLI
//!
//! Command-line tools for inspecting a docvault vault.
//!
//! # Commands
//!
//! - `log` - Print revision history, newest first
//! - `show` - Print one revision
//! - `verify` - Check the journal and that head matches the working document
//! - `inspect` - Display vault paths and statistics
//!
//! Every command opens the vault read-only. A vault that a running server
//! holds cannot be opened.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// docvault command-line tools.
#[derive(Parser)]
#[command(name = "docvault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the vault directory
    #[arg(global = true, short, long, env = "DOCVAULT_REPO_PATH")]
    path: Option<PathBuf>,

    /// Branch (line of history) to read
    #[arg(global = true, short, long, default_value = docvault_core::DEFAULT_BRANCH)]
    branch: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format of listing commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print revision history, newest first
    Log {
        /// Maximum number of revisions to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Print one revision
    Show {
        /// Revision handle or a prefix of at least four characters
        handle: String,
    },

    /// Verify the journal and the working document
    Verify,

    /// Display vault paths and statistics
    Inspect {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Log { limit, format } => {
            let path = cli.path.ok_or("Vault path required for log")?;
            commands::log::run(&path, &cli.branch, limit, format)?;
        }
        Commands::Show { handle } => {
            let path = cli.path.ok_or("Vault path required for show")?;
            commands::show::run(&path, &cli.branch, &handle)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Vault path required for verify")?;
            commands::verify::run(&path, &cli.branch)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Vault path required for inspect")?;
            commands::inspect::run(&path, &cli.branch, format)?;
        }
        Commands::Version => {
            println!("docvault CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("docvault core v{}", docvault_core::VERSION);
        }
    }

    Ok(())
}
