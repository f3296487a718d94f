//! Portfolio snapshot types returned by the `/portfolio/v2` endpoint.

use serde::{Deserialize, Serialize};

use super::de::flexible_f64;

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    #[serde(default)]
    pub account_id: Option<String>,

    #[serde(default)]
    pub positions: Vec<PortfolioPosition>,
}

/// A currently held position.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPosition {
    pub instrument: Instrument,

    /// Shares or contracts held. Negative for short positions.
    #[serde(default, deserialize_with = "flexible_f64")]
    pub quantity: Option<f64>,

    /// Market value of the whole position.
    #[serde(default, deserialize_with = "flexible_f64")]
    pub current_value: Option<f64>,

    #[serde(default)]
    pub last_price: Option<LastPrice>,

    #[serde(default, deserialize_with = "flexible_f64")]
    percent_of_portfolio: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    /// Ticker, or an OCC option symbol with an `-OPTION` suffix.
    pub symbol: String,

    /// `EQUITY`, `OPTION`, `CRYPTO`, ...
    #[serde(rename = "type", default)]
    pub instrument_type: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LastPrice {
    #[serde(default, deserialize_with = "flexible_f64")]
    pub last_price: Option<f64>,

    #[serde(default)]
    pub timestamp: Option<String>,
}

impl PortfolioPosition {
    /// True for option holdings, by instrument type or symbol suffix.
    pub fn is_option(&self) -> bool {
        self.instrument.instrument_type.as_deref() == Some("OPTION")
            || self.instrument.symbol.ends_with("-OPTION")
    }

    /// Symbol with any `-OPTION` suffix removed.
    pub fn clean_symbol(&self) -> &str {
        self.instrument
            .symbol
            .strip_suffix("-OPTION")
            .unwrap_or(&self.instrument.symbol)
    }
}
