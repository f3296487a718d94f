//! Orchestration: session, optional store, report and cache.

use std::collections::BTreeMap;
use std::time::Duration;

use brokerage_api::types::Transaction;
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::cache::MemoryCache;
use crate::client::BrokerageSession;
use crate::config::TrackerConfig;
use crate::db::Db;
use crate::describe::DescriptionParser;
use crate::error::TrackerError;
use crate::portfolio::CloseEvent;
use crate::reconcile::PortfolioSnapshot;
use crate::report::{build_report_with_term, recent_closes, PnlReport, Stats, Strategy};
use crate::trade::normalize_transactions;
use crate::validation::validate_days;

/// Samples kept per `type/subType` in the history summary.
const SAMPLES_PER_KIND: usize = 5;

const LAST_SYNC_KEY: &str = "last_sync";

/// A history row as shown by the debug summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSample {
    pub id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub tx_type: String,
    #[serde(rename = "subType")]
    pub sub_type: Option<String>,
    #[serde(rename = "netAmount")]
    pub net_amount: Option<f64>,
    #[serde(rename = "principalAmount")]
    pub principal_amount: Option<f64>,
    pub quantity: Option<f64>,
    pub symbol: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Fields the API populated for this row.
    pub all_fields: Vec<String>,
}

impl TransactionSample {
    fn from_transaction(tx: &Transaction) -> Self {
        let all_fields = match serde_json::to_value(tx) {
            Ok(serde_json::Value::Object(map)) => map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, _)| k)
                .collect(),
            _ => Vec::new(),
        };
        Self {
            id: tx.id.clone(),
            description: tx.description.clone(),
            tx_type: tx.tx_type.clone(),
            sub_type: tx.sub_type.clone(),
            net_amount: tx.net_amount,
            principal_amount: tx.principal_amount,
            quantity: tx.quantity,
            symbol: tx.symbol.clone(),
            timestamp: tx.timestamp,
            all_fields,
        }
    }
}

/// Counts and samples of every history category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySummary {
    pub total_transactions: usize,
    pub types_found: Vec<String>,
    pub counts_by_type: BTreeMap<String, usize>,
    pub samples_by_type: BTreeMap<String, Vec<TransactionSample>>,
}

impl HistorySummary {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut samples_by_type: BTreeMap<String, Vec<TransactionSample>> = BTreeMap::new();
        let mut counts_by_type: BTreeMap<String, usize> = BTreeMap::new();
        for tx in transactions {
            *counts_by_type.entry(tx.kind_label()).or_default() += 1;
            let samples = samples_by_type.entry(tx.kind_label()).or_default();
            if samples.len() < SAMPLES_PER_KIND {
                samples.push(TransactionSample::from_transaction(tx));
            }
        }
        Self {
            total_transactions: transactions.len(),
            types_found: samples_by_type.keys().cloned().collect(),
            counts_by_type,
            samples_by_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    pub fetched: usize,
    pub stored_total: i64,
    /// Newest transaction timestamp in the store after the sync.
    pub latest_stored: Option<DateTime<Utc>>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Computes and caches P&L reports for one account.
pub struct PnlService {
    session: BrokerageSession,
    cache: MemoryCache,
    db: Option<Mutex<Db>>,
    parser: DescriptionParser,
    config: TrackerConfig,
}

impl PnlService {
    pub fn new(session: BrokerageSession, config: TrackerConfig) -> Result<Self, TrackerError> {
        Ok(Self {
            session,
            cache: MemoryCache::new(Duration::from_secs(config.cache_ttl_secs)),
            db: None,
            parser: DescriptionParser::new()?,
            config,
        })
    }

    /// Builds the session and, when `db_path` is set, opens the store.
    pub fn from_config(config: TrackerConfig) -> Result<Self, TrackerError> {
        let session = BrokerageSession::new(&config)?;
        let db = match &config.db_path {
            Some(path) => {
                let db = Db::open(path)?;
                db.init()?;
                Some(db)
            }
            None => None,
        };
        let service = Self::new(session, config)?;
        Ok(match db {
            Some(db) => service.with_db(db),
            None => service,
        })
    }

    pub fn with_db(mut self, db: Db) -> Self {
        self.db = Some(Mutex::new(db));
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.config.strategy
    }

    fn cache_key(&self) -> String {
        format!("report:{}", self.config.strategy)
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache.ttl()
    }

    /// Age of the cached report, if one is live.
    pub fn cache_age(&self) -> Option<Duration> {
        self.cache.age(&self.cache_key())
    }

    fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start_date = self.config.history_start_or_year_start(now.date_naive());
        let start = Utc.from_utc_datetime(&start_date.and_time(NaiveTime::MIN));
        (start, now)
    }

    /// Fetches the history window and stores it when a database is attached.
    pub async fn fetch_transactions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, TrackerError> {
        let (start, end) = self.window(now);
        let transactions = self.session.fetch_history(start, end).await?;
        if let Some(db) = &self.db {
            let mut db = db.lock().await;
            db.upsert_transactions(&transactions)?;
            db.set_meta(LAST_SYNC_KEY, &end.to_rfc3339())?;
        }
        Ok(transactions)
    }

    async fn compute(&self, now: DateTime<Utc>) -> Result<PnlReport, TrackerError> {
        let transactions = self.fetch_transactions(now).await?;
        let portfolio = self.session.fetch_portfolio().await?;

        let trades = normalize_transactions(&transactions, &self.parser);
        tracing::info!(
            "{} of {} history rows are trades",
            trades.len(),
            transactions.len()
        );
        let snapshot = PortfolioSnapshot::from_portfolio(&portfolio);
        Ok(build_report_with_term(
            trades,
            &snapshot,
            self.config.strategy,
            self.config.long_term_days,
            now,
        ))
    }

    /// The current report. Served from the cache while fresh unless `force`.
    pub async fn report(&self, force: bool) -> Result<PnlReport, TrackerError> {
        self.report_at(force, Utc::now()).await
    }

    pub async fn report_at(
        &self,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<PnlReport, TrackerError> {
        let key = self.cache_key();
        if !force {
            if let Some(cached) = self.cache.get(&key) {
                let report: PnlReport = serde_json::from_str(&cached)
                    .map_err(|e| TrackerError::Cache(e.to_string()))?;
                tracing::debug!("Serving cached report");
                return Ok(report);
            }
        }

        match self.compute(now).await {
            Ok(report) => {
                self.cache.set(key, serde_json::to_string(&report)?);
                if let Some(db) = &self.db {
                    db.lock().await.save_report(&self.config.strategy.to_string(), &report)?;
                }
                Ok(report)
            }
            Err(TrackerError::Api(api_err)) => {
                let saved = match &self.db {
                    Some(db) => db
                        .lock()
                        .await
                        .latest_report(&self.config.strategy.to_string())?,
                    None => None,
                };
                match saved {
                    Some(report) => {
                        tracing::warn!(
                            "API unavailable ({}); serving report saved at {}",
                            api_err,
                            report.last_updated
                        );
                        Ok(report)
                    }
                    None => Err(TrackerError::Api(api_err)),
                }
            }
            Err(err) => Err(err),
        }
    }

    pub async fn stats(&self, now: DateTime<Utc>) -> Result<Stats, TrackerError> {
        let report = self.report_at(false, now).await?;
        Ok(Stats::from_report(&report, now))
    }

    /// Close events from the last `days` days.
    pub async fn trades(&self, days: i64, now: DateTime<Utc>) -> Result<Vec<CloseEvent>, TrackerError> {
        let days = validate_days(days)?;
        let report = self.report_at(false, now).await?;
        Ok(recent_closes(&report, days, now))
    }

    /// Drops every cached report.
    pub fn reset(&self) {
        self.cache.clear();
        tracing::info!("Report cache cleared");
    }

    /// Summary of the live history window. Falls back to the stored rows
    /// when the API is unreachable and a database is attached.
    pub async fn history_summary(&self, now: DateTime<Utc>) -> Result<HistorySummary, TrackerError> {
        match self.fetch_transactions(now).await {
            Ok(transactions) => Ok(HistorySummary::from_transactions(&transactions)),
            Err(TrackerError::Api(api_err)) if self.db.is_some() => {
                tracing::warn!("API unavailable ({}); summarizing stored history", api_err);
                self.stored_history_summary(now).await
            }
            Err(err) => Err(err),
        }
    }

    /// Summarizes the history window from the attached database, without
    /// calling the API.
    pub async fn stored_history_summary(
        &self,
        now: DateTime<Utc>,
    ) -> Result<HistorySummary, TrackerError> {
        let Some(db) = &self.db else {
            return Err(TrackerError::Config(
                "offline history needs a database path (--db or TRADETRACKER_DB)".to_string(),
            ));
        };
        let (start, end) = self.window(now);
        let transactions = db.lock().await.load_transactions(Some(start), Some(end))?;
        Ok(HistorySummary::from_transactions(&transactions))
    }

    /// Fetches the history window into the attached database.
    pub async fn sync(&self, now: DateTime<Utc>) -> Result<SyncSummary, TrackerError> {
        let Some(db) = &self.db else {
            return Err(TrackerError::Config(
                "sync needs a database path (--db or TRADETRACKER_DB)".to_string(),
            ));
        };
        let (start, end) = self.window(now);
        let fetched = self.fetch_transactions(now).await?.len();
        let db = db.lock().await;
        let stored_total = db.transaction_count()?;
        let latest_stored = db.latest_transaction_time()?;
        Ok(SyncSummary {
            fetched,
            stored_total,
            latest_stored,
            start,
            end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: &str, kind: &str, sub: &str) -> Transaction {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "timestamp": "2026-01-05T14:30:00Z",
            "type": kind,
            "subType": sub,
            "description": "row",
            "netAmount": "1.00"
        }))
        .unwrap()
    }

    #[test]
    fn history_summary_caps_samples() {
        let mut rows: Vec<Transaction> = (0..7).map(|i| tx(&format!("t{}", i), "TRADE", "TRADE")).collect();
        rows.push(tx("d1", "MONEY_MOVEMENT", "DEPOSIT"));
        let summary = HistorySummary::from_transactions(&rows);

        assert_eq!(summary.total_transactions, 8);
        assert_eq!(summary.types_found, vec!["MONEY_MOVEMENT/DEPOSIT", "TRADE/TRADE"]);
        assert_eq!(summary.samples_by_type["TRADE/TRADE"].len(), 5);
        assert_eq!(summary.counts_by_type["TRADE/TRADE"], 7);
        let sample = &summary.samples_by_type["MONEY_MOVEMENT/DEPOSIT"][0];
        assert!(sample.all_fields.contains(&"netAmount".to_string()));
        assert!(!sample.all_fields.contains(&"symbol".to_string()));
    }

    #[tokio::test]
    async fn sync_without_db_is_a_config_error() {
        let session = BrokerageSession::with_base_url("http://127.0.0.1:9", "secret");
        let service = PnlService::new(session, TrackerConfig::default()).unwrap();
        let err = service.sync(Utc::now()).await.unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)));
    }

    #[tokio::test]
    async fn stored_history_reads_only_the_window() {
        let mut db = Db::open_in_memory().unwrap();
        db.init().unwrap();
        let mut old = tx("old", "TRADE", "TRADE");
        old.timestamp = Utc.with_ymd_and_hms(2025, 12, 30, 14, 0, 0).unwrap();
        db.upsert_transactions(&[old, tx("t1", "TRADE", "TRADE"), tx("d1", "MONEY_MOVEMENT", "DEPOSIT")])
            .unwrap();

        let session = BrokerageSession::with_base_url("http://127.0.0.1:9", "secret");
        let service = PnlService::new(session, TrackerConfig::default())
            .unwrap()
            .with_db(db);
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let summary = service.stored_history_summary(now).await.unwrap();

        assert_eq!(summary.total_transactions, 2);
        assert_eq!(summary.counts_by_type["TRADE/TRADE"], 1);
        assert_eq!(service.cache_ttl(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn stored_history_without_db_is_a_config_error() {
        let session = BrokerageSession::with_base_url("http://127.0.0.1:9", "secret");
        let service = PnlService::new(session, TrackerConfig::default()).unwrap();
        let err = service.stored_history_summary(Utc::now()).await.unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)));
    }

    #[tokio::test]
    async fn trades_rejects_bad_window() {
        let session = BrokerageSession::with_base_url("http://127.0.0.1:9", "secret");
        let service = PnlService::new(session, TrackerConfig::default()).unwrap();
        let err = service.trades(0, Utc::now()).await.unwrap_err();
        assert!(matches!(err, TrackerError::InvalidInput(_)));
    }
}
