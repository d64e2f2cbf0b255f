use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bundlestore", about = "Atomic bundle record store", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding `bundlestore.json` (created with defaults if absent)
    #[arg(long, global = true, default_value = ".")]
    pub config: PathBuf,

    /// SQLite database file, overriding the configured path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Log at debug level regardless of the configured level
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a bundle file as one atomic transaction
    Apply {
        /// JSON file: an array of records, or an object with a `records` array
        file: PathBuf,
    },

    /// List committed record versions, most recent first
    History {
        /// Only entries recorded at or after this epoch-ms timestamp
        #[arg(long)]
        since: Option<i64>,

        /// Maximum number of entries (0 uses the configured default)
        #[arg(long)]
        limit: Option<u32>,
    },

    /// List every tag applied to a stored record
    Tags,
}
