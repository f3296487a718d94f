//! The `report` subcommand: computes realized and unrealized P&L.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tradetracker_lib::{validation, PnlService, TrackerConfig};

use crate::output::{print_report, OutputFormat};

/// Arguments for the `report` subcommand.
#[derive(Args)]
pub struct ReportArgs {
    /// Matching strategy: fifo, lifo, or net (overrides config)
    #[arg(long)]
    pub strategy: Option<String>,

    /// Start of the history window (YYYY-MM-DD, default Jan 1 this year)
    #[arg(long)]
    pub since: Option<String>,

    /// Hold lots longer than this many days to count as long-term
    #[arg(long)]
    pub long_term_days: Option<i64>,

    /// SQLite database to store history and fall back to when the API is down
    #[arg(long)]
    pub db: Option<PathBuf>,
}

pub async fn run(args: &ReportArgs, mut config: TrackerConfig, format: &OutputFormat) -> Result<()> {
    if let Some(ref strategy) = args.strategy {
        config.strategy = validation::validate_strategy(strategy)?;
    }
    if let Some(ref since) = args.since {
        config.history_start = Some(validation::validate_date(since)?);
    }
    if let Some(days) = args.long_term_days {
        config.long_term_days = validation::validate_days(days)?;
    }
    if let Some(ref db) = args.db {
        config.db_path = Some(db.clone());
    }

    let service = PnlService::from_config(config)?;
    let report = service.report(true).await?;
    print_report(&report, format)?;
    Ok(())
}
