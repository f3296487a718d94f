//! Runtime configuration: defaults, then an optional TOML file, then the
//! environment.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use crate::error::TrackerError;
use crate::report::Strategy;
use crate::validation::{validate_date, validate_page_size};

pub const DEFAULT_BASE_URL: &str = "https://api.public.com";
pub const DEFAULT_TOKEN_MINUTES: u32 = 120;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Personal API secret exchanged for access tokens.
    pub api_secret: Option<String>,
    pub base_url: String,
    pub token_minutes: u32,
    pub cache_ttl_secs: u64,
    pub strategy: Strategy,
    pub long_term_days: i64,
    /// First day of history to fetch; January 1st of the current year when unset.
    pub history_start: Option<NaiveDate>,
    pub db_path: Option<PathBuf>,
    pub bind: String,
    /// History rows requested per page.
    pub page_size: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_secret: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            token_minutes: DEFAULT_TOKEN_MINUTES,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            strategy: Strategy::default(),
            long_term_days: crate::portfolio::DEFAULT_LONG_TERM_DAYS,
            history_start: None,
            db_path: None,
            bind: DEFAULT_BIND.to_string(),
            page_size: brokerage_api::PageCommon::default().page_size,
        }
    }
}

impl TrackerConfig {
    /// Resolves the configuration from an optional TOML file and the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, TrackerError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    TrackerError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, TrackerError> {
        toml::from_str(content).map_err(|e| TrackerError::Config(format!("invalid TOML: {}", e)))
    }

    /// Applies `PUBLIC_API_TOKEN` and `TRADETRACKER_*` variables from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), TrackerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(secret) = get("PUBLIC_API_TOKEN") {
            self.api_secret = Some(secret);
        }
        if let Some(url) = get("TRADETRACKER_BASE_URL") {
            self.base_url = url;
        }
        if let Some(raw) = get("TRADETRACKER_TOKEN_MINUTES") {
            self.token_minutes = parse_number("TRADETRACKER_TOKEN_MINUTES", &raw)?;
        }
        if let Some(raw) = get("TRADETRACKER_CACHE_TTL_SECS") {
            self.cache_ttl_secs = parse_number("TRADETRACKER_CACHE_TTL_SECS", &raw)?;
        }
        if let Some(raw) = get("TRADETRACKER_STRATEGY") {
            self.strategy = raw
                .parse()
                .map_err(|e| TrackerError::Config(format!("TRADETRACKER_STRATEGY: {}", e)))?;
        }
        if let Some(raw) = get("TRADETRACKER_LONG_TERM_DAYS") {
            self.long_term_days = parse_number("TRADETRACKER_LONG_TERM_DAYS", &raw)?;
        }
        if let Some(raw) = get("TRADETRACKER_HISTORY_START") {
            self.history_start = Some(validate_date(&raw)?);
        }
        if let Some(path) = get("TRADETRACKER_DB") {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(bind) = get("TRADETRACKER_BIND") {
            self.bind = bind;
        }
        if let Some(raw) = get("TRADETRACKER_PAGE_SIZE") {
            self.page_size = validate_page_size(parse_number("TRADETRACKER_PAGE_SIZE", &raw)?)?;
        }
        Ok(())
    }

    /// The API secret, required by every command that talks to the network.
    pub fn secret(&self) -> Result<&str, TrackerError> {
        self.api_secret
            .as_deref()
            .ok_or_else(|| TrackerError::Config("PUBLIC_API_TOKEN is not set".to_string()))
    }

    pub fn history_start_or_year_start(&self, today: NaiveDate) -> NaiveDate {
        self.history_start
            .or_else(|| NaiveDate::from_ymd_opt(today.year(), 1, 1))
            .unwrap_or(today)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, TrackerError> {
    raw.parse::<T>()
        .map_err(|_| TrackerError::Config(format!("{} must be a number, got '{}'", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::MatchMethod;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.token_minutes, 120);
        assert_eq!(config.cache_ttl_secs, 300);
        assert_eq!(config.strategy, Strategy::Lots(MatchMethod::Fifo));
        assert_eq!(config.long_term_days, 365);
        assert_eq!(config.bind, "0.0.0.0:8080");
        assert!(config.secret().is_err());
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = TrackerConfig::from_toml_str(
            r#"
            strategy = "lifo"
            cache_ttl_secs = 60
            history_start = "2025-07-01"
            db_path = "/tmp/trades.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.strategy, Strategy::Lots(MatchMethod::Lifo));
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.history_start, NaiveDate::from_ymd_opt(2025, 7, 1));
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/trades.db")));
        assert_eq!(config.token_minutes, 120);
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let err = TrackerConfig::from_toml_str("strategy = \"hifo\"").unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)));
    }

    #[test]
    fn environment_wins_over_file() {
        let mut config = TrackerConfig::from_toml_str("strategy = \"lifo\"").unwrap();
        config
            .apply_overrides(lookup(&[
                ("PUBLIC_API_TOKEN", "secret-123"),
                ("TRADETRACKER_STRATEGY", "net"),
                ("TRADETRACKER_TOKEN_MINUTES", "30"),
                ("TRADETRACKER_BIND", "127.0.0.1:9000"),
                ("TRADETRACKER_DB", "  "),
                ("TRADETRACKER_PAGE_SIZE", "250"),
            ]))
            .unwrap();
        assert_eq!(config.secret().unwrap(), "secret-123");
        assert_eq!(config.strategy, Strategy::NetAmount);
        assert_eq!(config.token_minutes, 30);
        assert_eq!(config.bind, "127.0.0.1:9000");
        assert!(config.db_path.is_none());
        assert_eq!(config.page_size, 250);
    }

    #[test]
    fn page_size_outside_range_is_rejected() {
        let mut config = TrackerConfig::default();
        assert_eq!(config.page_size, 1000);
        let err = config
            .apply_overrides(lookup(&[("TRADETRACKER_PAGE_SIZE", "5000")]))
            .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidInput(_)));
    }

    #[test]
    fn invalid_env_numbers_are_rejected() {
        let mut config = TrackerConfig::default();
        let err = config
            .apply_overrides(lookup(&[("TRADETRACKER_CACHE_TTL_SECS", "five")]))
            .unwrap_err();
        assert!(err.to_string().contains("TRADETRACKER_CACHE_TTL_SECS"));
    }

    #[test]
    fn history_start_defaults_to_year_start() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let config = TrackerConfig::default();
        assert_eq!(
            config.history_start_or_year_start(today),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
        );
    }
}
