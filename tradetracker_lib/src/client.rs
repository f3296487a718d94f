//! Authenticated session around the API client: token reuse, account
//! resolution, history pagination and retries.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use brokerage_api::types::{Portfolio, Transaction};
use brokerage_api::{Client, HistoryQuery, Query};
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config::TrackerConfig;
use crate::error::TrackerError;

/// Tokens are refreshed this long before the server would expire them.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Upper bound on history pages followed in one fetch.
const MAX_HISTORY_PAGES: usize = 500;

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Exponential backoff settings for retryable failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2000,
            max_delay_ms: 30000,
        }
    }
}

impl RetryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: env_usize("TRADETRACKER_RETRY_MAX", defaults.max_retries),
            base_delay_ms: env_u64("TRADETRACKER_RETRY_BASE_MS", defaults.base_delay_ms),
            max_delay_ms: env_u64("TRADETRACKER_RETRY_MAX_MS", defaults.max_delay_ms),
        }
    }

    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(30) as u32;
        let exp = 1u64 << shift;
        let base = self
            .base_delay_ms
            .saturating_mul(exp)
            .min(self.max_delay_ms);
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_millis((base as f64 * jitter) as u64)
    }
}

/// API client plus the credentials and state needed to call it.
///
/// The access token is minted on first use and reused until one minute
/// before its validity window closes. A 401 drops the token and retries once
/// with a fresh one. The account id is resolved once per session.
pub struct BrokerageSession {
    inner: Client,
    secret: String,
    token_minutes: u32,
    retry: RetryConfig,
    page_size: i64,
    token: Mutex<Option<CachedToken>>,
    account_id: Mutex<Option<String>>,
}

impl BrokerageSession {
    pub fn new(config: &TrackerConfig) -> Result<Self, TrackerError> {
        let secret = config.secret()?;
        Ok(Self::with_base_url(&config.base_url, secret)
            .with_token_minutes(config.token_minutes)
            .with_page_size(config.page_size))
    }

    /// Session against a custom base URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str, secret: &str) -> Self {
        Self {
            inner: Client::with_base_url(base_url),
            secret: secret.to_string(),
            token_minutes: crate::config::DEFAULT_TOKEN_MINUTES,
            retry: RetryConfig::from_env(),
            page_size: brokerage_api::PageCommon::default().page_size,
            token: Mutex::new(None),
            account_id: Mutex::new(None),
        }
    }

    pub fn with_token_minutes(mut self, minutes: u32) -> Self {
        self.token_minutes = minutes.max(1);
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Returns a live access token, minting one when needed.
    pub async fn access_token(&self) -> Result<String, TrackerError> {
        {
            let slot = self.token.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = slot.as_ref() {
                if Instant::now() < cached.refresh_at {
                    return Ok(cached.value.clone());
                }
            }
        }

        let token = self
            .inner
            .create_access_token(&self.secret, self.token_minutes)
            .await?;
        let lifetime = Duration::from_secs(u64::from(self.token_minutes) * 60);
        let refresh_at = Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN);
        tracing::debug!("Minted access token valid for {} minutes", self.token_minutes);

        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at,
        });
        Ok(token.access_token)
    }

    fn drop_token(&self) {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// The brokerage account id, preferring a `BROKERAGE` account.
    pub async fn account_id(&self) -> Result<String, TrackerError> {
        let cached = self
            .account_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(id) = cached {
            return Ok(id);
        }

        let accounts = self
            .with_retry("accounts", || async {
                let token = self.access_token().await?;
                Ok(self.inner.get_accounts(&token).await?)
            })
            .await?;
        let account = accounts.brokerage_account().ok_or(TrackerError::NoAccount)?;
        tracing::info!("Using account {} ({})", account.account_id, account.account_type);

        let id = account.account_id.clone();
        *self.account_id.lock().unwrap_or_else(|e| e.into_inner()) = Some(id.clone());
        Ok(id)
    }

    /// Every history row between `start` and `end`, following `nextToken`.
    pub async fn fetch_history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, TrackerError> {
        let account_id = self.account_id().await?;
        let mut transactions = Vec::new();
        let mut next_token: Option<String> = None;

        for page in 1..=MAX_HISTORY_PAGES {
            let mut query = HistoryQuery::between(start, end).with_page_size(self.page_size);
            if let Some(cursor) = next_token.take() {
                query = query.with_next_token(cursor);
            }
            let resp = self
                .with_retry("history", || async {
                    let token = self.access_token().await?;
                    Ok(self.inner.get_history(&token, &account_id, &query).await?)
                })
                .await?;

            tracing::debug!("History page {}: {} rows", page, resp.transactions.len());
            let empty_page = resp.transactions.is_empty();
            transactions.extend(resp.transactions);

            match resp.next_token.filter(|t| !t.is_empty()) {
                Some(cursor) if !empty_page => {
                    if query.common.next_token.as_deref() == Some(cursor.as_str()) {
                        tracing::warn!("History cursor repeated; stopping pagination");
                        break;
                    }
                    next_token = Some(cursor);
                }
                _ => break,
            }
            if page == MAX_HISTORY_PAGES {
                tracing::warn!("Stopped after {} history pages", MAX_HISTORY_PAGES);
            }
        }

        tracing::info!(
            "Fetched {} history rows from {} to {}",
            transactions.len(),
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );
        Ok(transactions)
    }

    pub async fn fetch_portfolio(&self) -> Result<Portfolio, TrackerError> {
        let account_id = self.account_id().await?;
        let portfolio = self
            .with_retry("portfolio", || async {
                let token = self.access_token().await?;
                Ok(self.inner.get_portfolio(&token, &account_id).await?)
            })
            .await?;
        tracing::info!("Fetched portfolio with {} positions", portfolio.positions.len());
        Ok(portfolio)
    }

    async fn with_retry<T, F, Fut>(&self, label: &str, mut f: F) -> Result<T, TrackerError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, TrackerError>>,
    {
        let cfg = self.retry;
        let mut attempt = 0usize;
        let mut reauthenticated = false;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if is_unauthorized(&err) && !reauthenticated {
                        tracing::warn!("{} request unauthorized, refreshing token", label);
                        reauthenticated = true;
                        self.drop_token();
                        continue;
                    }
                    attempt += 1;
                    if attempt > cfg.max_retries || !is_retryable(&err) {
                        return Err(err);
                    }
                    let delay = cfg.delay_for_attempt(attempt);
                    tracing::warn!(
                        "{} request failed (attempt {}/{}), retrying in {:.1}s",
                        label,
                        attempt,
                        cfg.max_retries,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn is_unauthorized(err: &TrackerError) -> bool {
    matches!(err, TrackerError::Api(api_err) if api_err.is_unauthorized())
}

fn is_retryable(err: &TrackerError) -> bool {
    match err {
        TrackerError::Api(api_err) => match api_err {
            brokerage_api::Error::RequestFailed => true,
            brokerage_api::Error::HttpStatus { status, .. } => *status == 429 || *status >= 500,
        },
        _ => false,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(default)
}
