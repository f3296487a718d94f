//! SQLite storage for fetched history and computed reports.

use std::path::Path;

use brokerage_api::types::Transaction;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::report::PnlReport;

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("date parse error: {0}")]
    Date(#[from] chrono::ParseError),
}

/// Row counts per `type/subType`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindCount {
    pub kind: String,
    pub count: i64,
}

const SCHEMA_VERSION: i32 = 1;

pub struct Db {
    conn: Connection,
}

fn ts(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(Self { conn })
    }

    /// Applies the schema and stamps `user_version`. Safe to call on every open.
    pub fn init(&self) -> Result<(), DbError> {
        let schema = include_str!("../../schema/sqlite.sql");
        self.conn.execute_batch(schema)?;

        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            self.conn
                .pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }

        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>, DbError> {
        self.conn
            .query_row(
                "SELECT value FROM ingest_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO ingest_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn transaction_count(&self) -> Result<i64, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(1) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Inserts or replaces history rows by id. Returns the number written.
    pub fn upsert_transactions(&mut self, transactions: &[Transaction]) -> Result<usize, DbError> {
        let synced_at = ts(&Utc::now());
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO transactions (
                   tx_id, timestamp, tx_type, sub_type, description, symbol,
                   quantity, net_amount, fees, raw_json, synced_at
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(tx_id) DO UPDATE SET
                   timestamp = excluded.timestamp,
                   tx_type = excluded.tx_type,
                   sub_type = excluded.sub_type,
                   description = excluded.description,
                   symbol = COALESCE(excluded.symbol, transactions.symbol),
                   quantity = excluded.quantity,
                   net_amount = excluded.net_amount,
                   fees = excluded.fees,
                   raw_json = excluded.raw_json,
                   synced_at = excluded.synced_at",
            )?;
            for t in transactions {
                let raw = serde_json::to_string(t)?;
                stmt.execute(params![
                    t.id,
                    ts(&t.timestamp),
                    t.tx_type,
                    t.sub_type,
                    t.description,
                    t.symbol,
                    t.quantity,
                    t.net_amount,
                    t.fees,
                    raw,
                    synced_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(transactions.len())
    }

    /// History rows inside the optional window, oldest first.
    pub fn load_transactions(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>, DbError> {
        let start = start.map(|s| ts(&s));
        let end = end.map(|e| ts(&e));
        let mut stmt = self.conn.prepare(
            "SELECT raw_json FROM transactions
             WHERE (?1 IS NULL OR timestamp >= ?1)
               AND (?2 IS NULL OR timestamp <= ?2)
             ORDER BY timestamp, tx_id",
        )?;
        let rows = stmt.query_map(params![start, end], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for raw in rows {
            out.push(serde_json::from_str(&raw?)?);
        }
        Ok(out)
    }

    pub fn latest_transaction_time(&self) -> Result<Option<DateTime<Utc>>, DbError> {
        let max: Option<String> = self
            .conn
            .query_row("SELECT MAX(timestamp) FROM transactions", [], |row| row.get(0))?;
        let Some(value) = max else {
            return Ok(None);
        };
        Ok(Some(DateTime::parse_from_rfc3339(&value)?.with_timezone(&Utc)))
    }

    pub fn transaction_type_counts(&self) -> Result<Vec<KindCount>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT tx_type || '/' || COALESCE(sub_type, 'UNKNOWN') AS kind, COUNT(1)
             FROM transactions
             GROUP BY kind
             ORDER BY kind",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(KindCount {
                kind: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Stores the report under `key`, replacing any earlier one.
    pub fn save_report(&self, key: &str, report: &PnlReport) -> Result<(), DbError> {
        let json = serde_json::to_string(report)?;
        self.conn.execute(
            "INSERT INTO report_snapshots (
               report_key, strategy, total_realized_pl, total_unrealized_pl, report_json, generated_at
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(report_key) DO UPDATE SET
               strategy = excluded.strategy,
               total_realized_pl = excluded.total_realized_pl,
               total_unrealized_pl = excluded.total_unrealized_pl,
               report_json = excluded.report_json,
               generated_at = excluded.generated_at",
            params![
                key,
                report.strategy.to_string(),
                report.total_realized_pl,
                report.total_unrealized_pl,
                json,
                ts(&report.last_updated),
            ],
        )?;
        Ok(())
    }

    pub fn latest_report(&self, key: &str) -> Result<Option<PnlReport>, DbError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT report_json FROM report_snapshots WHERE report_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
