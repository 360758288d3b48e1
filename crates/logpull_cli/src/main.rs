//! logpull
//!
//! Serves feeds over mutual TLS and works on a data directory offline.
//!
//! # Commands
//!
//! - `serve` - Run the server from a config file
//! - `append` - Register a file in a feed
//! - `read` - List a feed from a cursor
//! - `inspect` - Show feeds and engine statistics

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// File registration and feed server.
#[derive(Parser)]
#[command(name = "logpull")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory (offline commands)
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
    /// Run the mutual-TLS server until interrupted
    Serve {
        /// Path to the TOML config file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Register a file in a feed
    Append {
        /// Feed name
        feed: String,

        /// Absolute path of the file
        file: String,
    },

    /// List a feed from a cursor
    Read {
        /// Feed name
        feed: String,

        /// First id to return
        #[arg(short, long, default_value = "0")]
        since: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Display feeds and engine statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve { config } => {
            commands::serve::run(&config)?;
        }
        Commands::Append { feed, file } => {
            let path = cli.path.ok_or("Data path required for append")?;
            commands::append::run(&path, &feed, &file)?;
        }
        Commands::Read {
            feed,
            since,
            format,
        } => {
            let path = cli.path.ok_or("Data path required for read")?;
            commands::read::run(&path, &feed, since, &format)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Data path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Version => {
            println!("logpull v{}", env!("CARGO_PKG_VERSION"));
            println!("logpull core v{}", logpull_core::VERSION);
        }
    }

    Ok(())
}
