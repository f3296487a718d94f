//! Error types for the library layer.

use std::fmt;

use crate::db::DbError;

/// Errors produced by the library layer, wrapping upstream API errors
/// and adding cache, storage, configuration and input validation failures.
#[derive(Debug)]
pub enum TrackerError {
    /// An error from the underlying API client.
    Api(brokerage_api::Error),
    /// A cache operation failed (e.g. deserialization of cached data).
    Cache(String),
    /// JSON serialization or deserialization failed.
    Serialization(serde_json::Error),
    /// User-provided input failed validation.
    InvalidInput(String),
    /// The local SQLite store failed.
    Db(DbError),
    /// Configuration is missing or malformed.
    Config(String),
    /// The token holder has no account to read history from.
    NoAccount,
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(e) => write!(f, "API error: {}", e),
            Self::Cache(msg) => write!(f, "Cache error: {}", msg),
            Self::Serialization(e) => write!(f, "Serialization error: {}", e),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Self::Db(e) => write!(f, "Database error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::NoAccount => write!(f, "No brokerage account found for this token"),
        }
    }
}

impl std::error::Error for TrackerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Api(e) => Some(e),
            Self::Serialization(e) => Some(e),
            Self::Db(e) => Some(e),
            _ => None,
        }
    }
}

impl From<brokerage_api::Error> for TrackerError {
    fn from(e: brokerage_api::Error) -> Self {
        Self::Api(e)
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e)
    }
}

impl From<DbError> for TrackerError {
    fn from(e: DbError) -> Self {
        Self::Db(e)
    }
}
