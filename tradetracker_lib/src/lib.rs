//! Library layer for the trade tracker: authenticated session, lot matching,
//! portfolio reconciliation and P&L reports.
//!
//! Wraps the `brokerage_api` crate with token reuse, retries, an in-memory
//! TTL cache, an optional SQLite store and input validation.

pub mod cache;
pub mod client;
pub mod config;
pub mod db;
pub mod describe;
pub mod error;
pub mod portfolio;
pub mod reconcile;
pub mod report;
pub mod service;
pub mod trade;
pub mod validation;

pub use brokerage_api;
pub use brokerage_api::types;

pub use client::{BrokerageSession, RetryConfig};
pub use config::TrackerConfig;
pub use db::{Db, DbError};
pub use error::TrackerError;
pub use portfolio::{calculate_positions, CloseEvent, Ledger, MatchMethod, Position};
pub use reconcile::PortfolioSnapshot;
pub use report::{build_report, PnlReport, PositionSummary, Stats, Strategy};
pub use service::{HistorySummary, PnlService};
pub use trade::TradeRecord;
