//! HTTP client for the brokerage's personal trading API.

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use crate::{
    query::{HistoryQuery, Query},
    types::{AccessToken, AccessTokenRequest, AccountsResponse, HistoryResponse, Portfolio},
    Error,
};

const USER_AGENT: &str = concat!("tradetracker/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the brokerage REST API.
///
/// Token exchange goes to the auth service; every other call goes to the
/// trading gateway with a bearer token. Each request builds a fresh
/// `reqwest::Client` with a 30-second timeout.
pub struct Client {
    /// Base URL for the API. Defaults to `https://api.public.com`.
    base_api_url: String,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Creates a new client pointing at the production API.
    pub fn new() -> Self {
        Self {
            base_api_url: "https://api.public.com".to_string(),
        }
    }

    /// Creates a new client with a custom base URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_api_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_api_url
    }

    fn get_url(&self, path: &str, query: Option<&impl Query>) -> Result<Url, Error> {
        let url = Url::parse(format!("{}{}", &self.base_api_url, path).as_str()).map_err(|e| {
            tracing::error!("Invalid URL constructed: {}", e);
            Error::RequestFailed
        })?;
        Ok(match query {
            Some(query) => query.add_to_url(&url),
            None => url,
        })
    }

    fn http(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                tracing::error!("Failed to build HTTP client: {}", e);
                Error::RequestFailed
            })
    }

    async fn get<T, Q>(&self, path: &str, token: &str, query: Option<&Q>) -> Result<T, Error>
    where
        T: DeserializeOwned,
        Q: Query,
    {
        let url = self.get_url(path, query)?;
        let resp = self
            .http()?
            .get(url)
            .bearer_auth(token)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to get resource: {}", e);
                Error::RequestFailed
            })?;
        decode(resp).await
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let url = self.get_url(path, None::<&HistoryQuery>)?;
        let resp = self
            .http()?
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to post resource: {}", e);
                Error::RequestFailed
            })?;
        decode(resp).await
    }

    /// Exchanges a personal API secret for a short-lived access token.
    pub async fn create_access_token(
        &self,
        secret: &str,
        validity_minutes: u32,
    ) -> Result<AccessToken, Error> {
        let body = AccessTokenRequest {
            secret: secret.to_string(),
            validity_in_minutes: validity_minutes,
        };
        self.post::<AccessToken, AccessTokenRequest>(
            "/userapiauthservice/personal/access-tokens",
            &body,
        )
        .await
    }

    /// Lists the accounts visible to the token.
    pub async fn get_accounts(&self, token: &str) -> Result<AccountsResponse, Error> {
        self.get::<AccountsResponse, HistoryQuery>("/userapigateway/trading/account", token, None)
            .await
    }

    /// Fetches one page of account history.
    pub async fn get_history(
        &self,
        token: &str,
        account_id: &str,
        query: &HistoryQuery,
    ) -> Result<HistoryResponse, Error> {
        self.get::<HistoryResponse, HistoryQuery>(
            format!("/userapigateway/trading/{}/history", account_id).as_str(),
            token,
            Some(query),
        )
        .await
    }

    /// Fetches the current holdings of an account.
    pub async fn get_portfolio(&self, token: &str, account_id: &str) -> Result<Portfolio, Error> {
        self.get::<Portfolio, HistoryQuery>(
            format!("/userapigateway/trading/{}/portfolio/v2", account_id).as_str(),
            token,
            None,
        )
        .await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| {
        tracing::error!("Failed to read response body: {}", e);
        Error::RequestFailed
    })?;

    if !status.is_success() {
        let snippet = truncate_body(&body);
        tracing::error!("Request failed with status {}: {}", status, snippet);
        return Err(Error::HttpStatus {
            status: status.as_u16(),
            body: snippet,
        });
    }

    serde_json::from_str::<T>(&body).map_err(|e| {
        let snippet = truncate_body(&body);
        tracing::error!("Failed to parse resource: {} | body: {}", e, snippet);
        Error::RequestFailed
    })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated]", &body[..end])
    }
}
