//! The `serve` subcommand: JSON endpoints over HTTP.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tradetracker_lib::{validation, PnlService, TrackerConfig};

/// Arguments for the `serve` subcommand.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on (overrides TRADETRACKER_BIND)
    #[arg(long)]
    pub bind: Option<String>,

    /// Matching strategy: fifo, lifo, or net (overrides config)
    #[arg(long)]
    pub strategy: Option<String>,
}

pub async fn run(args: &ServeArgs, mut config: TrackerConfig) -> Result<()> {
    if let Some(ref bind) = args.bind {
        config.bind = bind.clone();
    }
    if let Some(ref strategy) = args.strategy {
        config.strategy = validation::validate_strategy(strategy)?;
    }
    let bind = config.bind.clone();
    let service = Arc::new(PnlService::from_config(config)?);
    crate::server::serve(service, &bind).await
}
