//! docdump CLI
//!
//! Command-line tools for working with dump trees offline.
//!
//! # Commands
//!
//! - `inspect` - List the units of a dump directory or archive
//! - `verify` - Decode every document and check replay ordering
//! - `archive` - Compress a completed run directory
//! - `extract` - Expand an archived run
//! - `checkpoint` - Show the persisted incremental position

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// docdump command-line dump-tree tools.
#[derive(Parser)]
#[command(name = "docdump")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the units of a dump directory or archive
    Inspect {
        /// Dump directory or archive
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decode every document of every unit and check replay ordering
    Verify {
        /// Dump directory or archive
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Compress a completed run directory and remove it
    Archive {
        /// Run directory to compress
        dir: PathBuf,
    },

    /// Expand an archived run
    Extract {
        /// Archive to expand
        archive: PathBuf,

        /// Expand into this directory instead of next to the archive
        #[arg(long)]
        into: Option<PathBuf>,
    },

    /// Show the persisted incremental position
    Checkpoint {
        /// Output root holding the checkpoint file
        root: PathBuf,
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
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { path, format } => {
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify { path, format } => {
            commands::verify::run(&path, &format)?;
        }
        Commands::Archive { dir } => {
            commands::archive::run(&dir)?;
        }
        Commands::Extract { archive, into } => {
            commands::extract::run(&archive, into.as_deref())?;
        }
        Commands::Checkpoint { root } => {
            commands::checkpoint::run(&root)?;
        }
        Commands::Version => {
            println!("docdump CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("docdump Core v{}", docdump_core::VERSION);
        }
    }

    Ok(())
}
