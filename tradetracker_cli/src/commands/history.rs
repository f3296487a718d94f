//! The `history` subcommand: groups raw history rows by type.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use tradetracker_lib::{validation, PnlService, TrackerConfig};

use crate::output::{print_history, OutputFormat};

/// Arguments for the `history` subcommand.
#[derive(Args)]
pub struct HistoryArgs {
    /// Start of the history window (YYYY-MM-DD, default Jan 1 this year)
    #[arg(long)]
    pub since: Option<String>,

    /// SQLite database to store history in and fall back to when the API is down
    #[arg(long)]
    pub db: Option<PathBuf>,
}

pub async fn run(args: &HistoryArgs, mut config: TrackerConfig, format: &OutputFormat) -> Result<()> {
    if let Some(ref since) = args.since {
        config.history_start = Some(validation::validate_date(since)?);
    }
    if let Some(ref db) = args.db {
        config.db_path = Some(db.clone());
    }

    let service = PnlService::from_config(config)?;
    let summary = service.history_summary(Utc::now()).await?;
    print_history(&summary, format)?;
    Ok(())
}
