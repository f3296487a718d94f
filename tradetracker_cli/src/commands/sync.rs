//! The `sync` subcommand: stores the history window in SQLite.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Args;
use tradetracker_lib::{validation, Db, PnlService, TrackerConfig};

use crate::output::{print_stored_kinds, OutputFormat};

/// Arguments for the `sync` subcommand.
#[derive(Args)]
pub struct SyncArgs {
    /// SQLite database path (overrides TRADETRACKER_DB)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Start of the history window (YYYY-MM-DD, default Jan 1 this year)
    #[arg(long)]
    pub since: Option<String>,

    /// History rows requested per page (1-1000)
    #[arg(long)]
    pub page_size: Option<i64>,
}

pub async fn run(args: &SyncArgs, mut config: TrackerConfig, format: &OutputFormat) -> Result<()> {
    if let Some(ref db) = args.db {
        config.db_path = Some(db.clone());
    }
    if let Some(ref since) = args.since {
        config.history_start = Some(validation::validate_date(since)?);
    }
    if let Some(page_size) = args.page_size {
        config.page_size = validation::validate_page_size(page_size)?;
    }
    let db_path = config
        .db_path
        .clone()
        .ok_or_else(|| anyhow!("sync needs a database path (--db or TRADETRACKER_DB)"))?;

    eprintln!("Syncing history into {}...", db_path.display());
    let service = PnlService::from_config(config)?;
    let summary = service.sync(Utc::now()).await?;
    eprintln!(
        "Fetched {} transactions ({} to {}); {} stored in total",
        summary.fetched,
        summary.start.format("%Y-%m-%d"),
        summary.end.format("%Y-%m-%d"),
        summary.stored_total
    );
    if let Some(latest) = summary.latest_stored {
        eprintln!("Newest stored transaction: {}", latest.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    let db = Db::open(&db_path)?;
    let counts = db.transaction_type_counts()?;
    print_stored_kinds(&counts, format)?;
    Ok(())
}
