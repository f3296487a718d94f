//! Account history types returned by the `/history` endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::de::flexible_f64;

/// A single account history entry: a trade, a money movement, a position
/// adjustment (expiration, assignment), a dividend, and so on.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,

    pub timestamp: DateTime<Utc>,

    /// Top-level category, e.g. `TRADE`, `MONEY_MOVEMENT`, `POSITION_ADJUSTMENT`.
    #[serde(rename = "type")]
    pub tx_type: String,

    #[serde(default)]
    pub sub_type: Option<String>,

    /// Human-readable summary such as `BUY 100 NVDA at 179.00`.
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub symbol: Option<String>,

    #[serde(default)]
    pub security_type: Option<String>,

    #[serde(default)]
    pub side: Option<String>,

    #[serde(default, deserialize_with = "flexible_f64")]
    pub quantity: Option<f64>,

    /// Signed cash impact including fees. Negative for purchases.
    #[serde(default, deserialize_with = "flexible_f64")]
    pub net_amount: Option<f64>,

    #[serde(default, deserialize_with = "flexible_f64")]
    pub principal_amount: Option<f64>,

    #[serde(default, deserialize_with = "flexible_f64")]
    pub fees: Option<f64>,

    #[serde(default)]
    pub order_id: Option<String>,
}

impl Transaction {
    /// True for executed trades (`TRADE/TRADE`), the only rows that move lots.
    pub fn is_trade(&self) -> bool {
        self.tx_type == "TRADE" && self.sub_type.as_deref() == Some("TRADE")
    }

    /// `type/subType` label used to group history entries.
    pub fn kind_label(&self) -> String {
        format!(
            "{}/{}",
            self.tx_type,
            self.sub_type.as_deref().unwrap_or("UNKNOWN")
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    #[serde(default)]
    pub transactions: Vec<Transaction>,

    /// Continuation cursor; absent on the last page.
    #[serde(default)]
    pub next_token: Option<String>,
}
