//! `bundlestore` command line entry point.
//!
//! # Responsibility
//! - Load the store config, start file logging and open the database.
//! - Map subcommands onto `SystemService` calls and print JSON results.

mod cli;
mod error;

use bundlestore_core::db::open_db;
use bundlestore_core::{init_logging, BundleOutcome, Record, StoreConfig, SystemService};
use clap::Parser;
use cli::{Cli, Commands};
use error::{exit_with_error, CliError, CliResult};
use log::info;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Accepted bundle file layouts.
#[derive(Deserialize)]
#[serde(untagged)]
enum BundleFile {
    Records(Vec<Record>),
    Wrapped { records: Vec<Record> },
}

impl BundleFile {
    fn into_records(self) -> Vec<Record> {
        match self {
            BundleFile::Records(records) | BundleFile::Wrapped { records } => records,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        exit_with_error(err);
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let base_dir = absolute(&cli.config)?;
    let config = StoreConfig::load_or_init(&base_dir)?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };
    let log_dir = config.log_dir(&base_dir);
    init_logging(level, &log_dir.to_string_lossy()).map_err(CliError::Logging)?;

    let db_path = match cli.db {
        Some(path) => absolute(&path)?,
        None => config.database_path(&base_dir),
    };
    let mut conn = open_db(&db_path)?;
    let mut service = SystemService::try_new(&mut conn, config.history_limits())?;

    match cli.command {
        Commands::Apply { file } => {
            info!(
                "event=cli_command module=cli status=start command=apply db={}",
                db_path.display()
            );
            let mut records = read_bundle(&file)?;
            let outcome = service.transaction(&mut records)?;
            println!("{:#}", outcome_json(&outcome, &records));
        }
        Commands::History { since, limit } => {
            info!("event=cli_command module=cli status=start command=history");
            let entries = service.history(since, limit)?;
            println!("{:#}", json!(entries));
        }
        Commands::Tags => {
            info!("event=cli_command module=cli status=start command=tags");
            let tags = service.all_tags()?;
            println!("{:#}", json!(tags));
        }
    }

    Ok(())
}

fn read_bundle(path: &Path) -> CliResult<Vec<Record>> {
    let raw = fs::read_to_string(path)
        .map_err(|err| CliError::Input(format!("cannot read `{}`: {err}", path.display())))?;
    let bundle: BundleFile = serde_json::from_str(&raw).map_err(|err| {
        CliError::Input(format!("invalid bundle file `{}`: {err}", path.display()))
    })?;
    Ok(bundle.into_records())
}

fn outcome_json(outcome: &BundleOutcome, records: &[Record]) -> Value {
    let entries: Vec<Value> = outcome
        .entries
        .iter()
        .map(|entry| {
            json!({
                "previousId": entry.previous_id,
                "id": entry.id,
                "created": entry.created,
                "version": entry.version,
            })
        })
        .collect();
    let mappings: Vec<Value> = outcome
        .id_mappings
        .iter()
        .map(|(old, new)| json!({ "from": old, "to": new }))
        .collect();

    json!({
        "batchId": outcome.batch_id.to_string(),
        "entries": entries,
        "idMappings": mappings,
        "rewrittenReferences": outcome.rewritten_references,
        "records": records,
    })
}

fn absolute(path: &Path) -> CliResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|err| CliError::Input(format!("cannot resolve working directory: {err}")))?;
    Ok(cwd.join(path))
}
