//! Normalized trade records built from raw history transactions.

use brokerage_api::types::Transaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::describe::{DescribedSide, DescriptionParser, OptionContract};

/// Contract multiplier for equity options.
pub const OPTION_MULTIPLIER: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Side::Buy => "buy",
                Side::Sell => "sell",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Instrument {
    Stock { symbol: String },
    Option(OptionContract),
}

impl Instrument {
    /// Key used to group lots: the ticker or the full option symbol.
    pub fn symbol(&self) -> &str {
        match self {
            Instrument::Stock { symbol } => symbol,
            Instrument::Option(contract) => &contract.symbol,
        }
    }

    pub fn is_option(&self) -> bool {
        matches!(self, Instrument::Option(_))
    }

    pub fn option(&self) -> Option<&OptionContract> {
        match self {
            Instrument::Option(contract) => Some(contract),
            Instrument::Stock { .. } => None,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Instrument::Stock { .. } => "stock",
            Instrument::Option(_) => "option",
        }
    }
}

/// One executed buy or sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub instrument: Instrument,
    pub side: Side,
    /// Shares or contracts, always positive.
    pub quantity: f64,
    /// Signed cash flow including fees; negative for purchases.
    pub net_amount: f64,
    pub price: Option<f64>,
}

impl TradeRecord {
    /// Cash per share or contract, fees included.
    pub fn unit_cash(&self) -> f64 {
        if self.quantity <= 0.0 {
            return 0.0;
        }
        self.net_amount.abs() / self.quantity
    }

    pub fn symbol(&self) -> &str {
        self.instrument.symbol()
    }

    /// Builds a trade record from a `TRADE/TRADE` history row.
    ///
    /// Structured fields win over the description; the description fills in
    /// whatever is missing. Returns `None` for non-trade rows and for rows
    /// whose symbol, side or cash amount cannot be recovered.
    pub fn from_transaction(tx: &Transaction, parser: &DescriptionParser) -> Option<Self> {
        if !tx.is_trade() {
            return None;
        }
        let parsed = parser.parse(&tx.description);

        let option_symbol = parser
            .find_option_symbol(&tx.description)
            .map(str::to_string)
            .or_else(|| {
                tx.symbol
                    .as_deref()
                    .filter(|s| OptionContract::parse(s).is_some())
                    .map(str::to_string)
            });
        let instrument = match option_symbol.as_deref().and_then(OptionContract::parse) {
            Some(contract) => Instrument::Option(contract),
            None => {
                let symbol = tx
                    .symbol
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .or_else(|| parsed.as_ref().map(|p| p.symbol.clone()))?;
                Instrument::Stock {
                    symbol: symbol.trim().to_ascii_uppercase(),
                }
            }
        };

        let side = match parsed.as_ref().map(|p| p.side) {
            Some(DescribedSide::Buy) => Side::Buy,
            Some(DescribedSide::Sell) => Side::Sell,
            None => match tx.side.as_deref().map(str::to_ascii_uppercase).as_deref() {
                Some("BUY") => Side::Buy,
                Some("SELL") => Side::Sell,
                _ => match tx.net_amount {
                    Some(amount) if amount < 0.0 => Side::Buy,
                    Some(amount) if amount > 0.0 => Side::Sell,
                    _ => {
                        tracing::warn!("Skipping trade {} with unknown side", tx.id);
                        return None;
                    }
                },
            },
        };

        let quantity = tx
            .quantity
            .map(f64::abs)
            .filter(|q| *q > 0.0)
            .or_else(|| parsed.as_ref().map(|p| p.quantity))
            .unwrap_or(1.0);
        let price = parsed.as_ref().and_then(|p| p.price);

        let net_amount = match tx.net_amount.or(tx.principal_amount) {
            Some(amount) => amount,
            None => {
                let Some(price) = price else {
                    tracing::warn!("Skipping trade {} with no cash amount", tx.id);
                    return None;
                };
                let multiplier = if instrument.is_option() {
                    OPTION_MULTIPLIER
                } else {
                    1.0
                };
                let gross = price * quantity * multiplier;
                match side {
                    Side::Buy => -gross,
                    Side::Sell => gross,
                }
            }
        };

        Some(Self {
            id: tx.id.clone(),
            timestamp: tx.timestamp,
            instrument,
            side,
            quantity,
            net_amount,
            price,
        })
    }
}

/// Converts raw history into trade records, dropping non-trade rows.
pub fn normalize_transactions(
    transactions: &[Transaction],
    parser: &DescriptionParser,
) -> Vec<TradeRecord> {
    transactions
        .iter()
        .filter_map(|tx| TradeRecord::from_transaction(tx, parser))
        .collect()
}
