mod commands;
mod output;
mod server;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tradetracker_lib::TrackerConfig;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "tradetracker")]
#[command(about = "Realized and unrealized P&L for a brokerage account")]
struct Cli {
    /// Output format: table, json, csv, or markdown
    #[arg(long, default_value = "table", global = true)]
    output: String,

    /// TOML config file (environment variables still override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the P&L report
    Report(commands::report::ReportArgs),
    /// List closing trades from the last N days
    Trades(commands::trades::TradesArgs),
    /// Show transaction types with sample rows
    History(commands::history::HistoryArgs),
    /// Store the history window in SQLite
    Sync(commands::sync::SyncArgs),
    /// Serve the report over HTTP
    Serve(commands::serve::ServeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tradetracker=info".parse()?),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::parse(&cli.output)?;
    let config = TrackerConfig::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Report(args) => commands::report::run(args, config, &format).await?,
        Commands::Trades(args) => commands::trades::run(args, config, &format).await?,
        Commands::History(args) => commands::history::run(args, config, &format).await?,
        Commands::Sync(args) => commands::sync::run(args, config, &format).await?,
        Commands::Serve(args) => commands::serve::run(args, config).await?,
    }

    Ok(())
}
