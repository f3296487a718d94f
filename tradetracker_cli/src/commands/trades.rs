//! The `trades` subcommand: lists recent closing trades.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use tradetracker_lib::{validation, PnlService, TrackerConfig};

use crate::output::{print_closes, OutputFormat};

/// Arguments for the `trades` subcommand.
#[derive(Args)]
pub struct TradesArgs {
    /// Closing trades from the last N days (1-3650)
    #[arg(long, default_value = "7")]
    pub days: i64,

    /// Matching strategy: fifo, lifo, or net (overrides config)
    #[arg(long)]
    pub strategy: Option<String>,
}

pub async fn run(args: &TradesArgs, mut config: TrackerConfig, format: &OutputFormat) -> Result<()> {
    let days = validation::validate_days(args.days)?;
    if let Some(ref strategy) = args.strategy {
        config.strategy = validation::validate_strategy(strategy)?;
    }

    let service = PnlService::from_config(config)?;
    let closes = service.trades(days, Utc::now()).await?;
    if closes.is_empty() {
        eprintln!("No closing trades in the last {} days", days);
        return Ok(());
    }
    print_closes(&closes, format)?;
    Ok(())
}
