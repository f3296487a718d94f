//! Parsing of brokerage trade descriptions and OCC option symbols.
//!
//! History rows describe executions as free text (`BUY 100 NVDA at 179.00`,
//! `SELL 1 NVDA260123P00170000 at 2.50`). The structured fields are not
//! always populated, so the description is the fallback source of side,
//! quantity, symbol and price.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

/// An option contract decoded from its OCC-style symbol,
/// e.g. `NVDA260123P00180000`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub symbol: String,
    pub underlying: String,
    pub expiry: NaiveDate,
    pub right: OptionRight,
    pub strike: f64,
}

impl OptionContract {
    /// Decodes `UNDERLYING` + `YYMMDD` + `C|P` + strike x1000 as 8 digits.
    pub fn parse(symbol: &str) -> Option<Self> {
        let symbol = symbol.trim();
        let bytes = symbol.as_bytes();
        if bytes.len() < 16 || !symbol.is_ascii() {
            return None;
        }
        let strike_start = bytes.len() - 8;
        let right_pos = strike_start - 1;
        let date_start = right_pos - 6;

        let underlying = &symbol[..date_start];
        if !underlying.bytes().all(|b| b.is_ascii_uppercase()) {
            return None;
        }
        let date_digits = &symbol[date_start..right_pos];
        let strike_digits = &symbol[strike_start..];
        if !date_digits.bytes().all(|b| b.is_ascii_digit())
            || !strike_digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let right = match bytes[right_pos] {
            b'C' => OptionRight::Call,
            b'P' => OptionRight::Put,
            _ => return None,
        };

        let year: i32 = date_digits[0..2].parse().ok()?;
        let month: u32 = date_digits[2..4].parse().ok()?;
        let day: u32 = date_digits[4..6].parse().ok()?;
        let expiry = NaiveDate::from_ymd_opt(2000 + year, month, day)?;
        let strike = strike_digits.parse::<u64>().ok()? as f64 / 1000.0;

        Some(Self {
            symbol: symbol.to_string(),
            underlying: underlying.to_string(),
            expiry,
            right,
            strike,
        })
    }

    pub fn is_put(&self) -> bool {
        self.right == OptionRight::Put
    }

    /// `UNDERLYING_YYMMDD` key shared by every leg of a spread.
    pub fn spread_key(&self) -> String {
        format!("{}_{}", self.underlying, self.expiry.format("%y%m%d"))
    }
}

/// Buy or sell as written in a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescribedSide {
    Buy,
    Sell,
}

/// Fields recovered from a trade description.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDescription {
    pub side: DescribedSide,
    pub quantity: f64,
    pub symbol: String,
    pub price: Option<f64>,
}

/// Compiled patterns for trade descriptions.
pub struct DescriptionParser {
    trade_re: Regex,
    option_re: Regex,
}

impl DescriptionParser {
    pub fn new() -> Result<Self, TrackerError> {
        let trade_re = Regex::new(
            r"(?i)^\s*(?P<side>BUY|SELL)\s+(?:(?P<qty>[\d,]*\.?\d+)\s+)?(?P<symbol>[A-Z0-9.\-/]+)(?:\s+at\s+\$?(?P<price>[\d,]*\.?\d+))?",
        )
        .map_err(|e| TrackerError::Config(format!("regex compile error: {}", e)))?;
        let option_re = Regex::new(r"[A-Z]+\d{6}[CP]\d{8}")
            .map_err(|e| TrackerError::Config(format!("regex compile error: {}", e)))?;
        Ok(Self {
            trade_re,
            option_re,
        })
    }

    /// First OCC option symbol appearing anywhere in `text`.
    pub fn find_option_symbol<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.option_re.find(text).map(|m| m.as_str())
    }

    /// Parses `SIDE [QTY] SYMBOL [at PRICE]`. Quantity defaults to 1.
    pub fn parse(&self, text: &str) -> Option<ParsedDescription> {
        let cap = self.trade_re.captures(text)?;
        let side = if cap["side"].eq_ignore_ascii_case("BUY") {
            DescribedSide::Buy
        } else {
            DescribedSide::Sell
        };
        let quantity = cap
            .name("qty")
            .and_then(|m| parse_number(m.as_str()))
            .unwrap_or(1.0);
        let symbol = cap["symbol"].to_ascii_uppercase();
        let price = cap.name("price").and_then(|m| parse_number(m.as_str()));
        Some(ParsedDescription {
            side,
            quantity,
            symbol,
            price,
        })
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> DescriptionParser {
        DescriptionParser::new().unwrap()
    }

    #[test]
    fn parse_put_contract() {
        let c = OptionContract::parse("NVDA260123P00180000").unwrap();
        assert_eq!(c.underlying, "NVDA");
        assert_eq!(c.expiry, NaiveDate::from_ymd_opt(2026, 1, 23).unwrap());
        assert_eq!(c.right, OptionRight::Put);
        assert!((c.strike - 180.0).abs() < 1e-9);
        assert!(c.is_put());
        assert_eq!(c.spread_key(), "NVDA_260123");
    }

    #[test]
    fn parse_call_with_fractional_strike() {
        let c = OptionContract::parse("SOXL260130C00045500").unwrap();
        assert_eq!(c.right, OptionRight::Call);
        assert!((c.strike - 45.5).abs() < 1e-9);
    }

    #[test]
    fn reject_non_option_symbols() {
        assert!(OptionContract::parse("NVDA").is_none());
        assert!(OptionContract::parse("260123P00180000").is_none());
        assert!(OptionContract::parse("NVDA261323P00180000").is_none());
        assert!(OptionContract::parse("NVDA260123X00180000").is_none());
        assert!(OptionContract::parse("nvda260123P00180000").is_none());
    }

    #[test]
    fn find_option_symbol_in_text() {
        let p = parser();
        assert_eq!(
            p.find_option_symbol("SELL 1 NVDA260123P00170000 at 2.50"),
            Some("NVDA260123P00170000")
        );
        assert_eq!(p.find_option_symbol("BUY 100 NVDA at 179.00"), None);
    }

    #[test]
    fn parse_stock_description() {
        let parsed = parser().parse("BUY 100 NVDA at 179.00").unwrap();
        assert_eq!(parsed.side, DescribedSide::Buy);
        assert_eq!(parsed.quantity, 100.0);
        assert_eq!(parsed.symbol, "NVDA");
        assert_eq!(parsed.price, Some(179.0));
    }

    #[test]
    fn parse_fractional_and_comma_quantities() {
        let parsed = parser().parse("SELL 1,250.5 BRK.B at $1,020.10").unwrap();
        assert_eq!(parsed.side, DescribedSide::Sell);
        assert_eq!(parsed.quantity, 1250.5);
        assert_eq!(parsed.symbol, "BRK.B");
        assert_eq!(parsed.price, Some(1020.10));
    }

    #[test]
    fn parse_missing_quantity_defaults_to_one() {
        let parsed = parser().parse("SELL GLD260227P00400000").unwrap();
        assert_eq!(parsed.quantity, 1.0);
        assert_eq!(parsed.symbol, "GLD260227P00400000");
        assert_eq!(parsed.price, None);
    }

    #[test]
    fn parse_rejects_non_trades() {
        assert!(parser().parse("ACH deposit").is_none());
        assert!(parser().parse("").is_none());
    }
}
