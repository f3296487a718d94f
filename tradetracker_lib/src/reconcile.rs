//! Classification of trades against the current portfolio snapshot.
//!
//! History alone cannot tell a sold-to-close option from one that expired or
//! was assigned, so the held option contracts and held stock symbols decide
//! which contracts are still open and which puts ended in assignment.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use brokerage_api::types::Portfolio;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::portfolio::{CloseEvent, Direction, HoldingTerm, Ledger, EPSILON};
use crate::report::{PositionKind, PositionStatus, PositionSummary};
use crate::trade::{Instrument, Side, TradeRecord, OPTION_MULTIPLIER};

/// What the account holds right now.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// OCC symbols of held option contracts, `-OPTION` suffix stripped.
    pub option_symbols: BTreeSet<String>,
    pub stock_symbols: BTreeSet<String>,
    /// Market value per share or contract.
    pub marks: HashMap<String, f64>,
}

impl PortfolioSnapshot {
    pub fn from_portfolio(portfolio: &Portfolio) -> Self {
        let mut snapshot = Self::default();
        for position in &portfolio.positions {
            let symbol = position.clean_symbol().trim().to_string();
            if symbol.is_empty() {
                continue;
            }
            let is_option = position.is_option();

            let quantity = position.quantity.map(f64::abs).filter(|q| *q > EPSILON);
            let mark = match (position.current_value, quantity) {
                (Some(value), Some(qty)) => Some(value.abs() / qty),
                _ => position
                    .last_price
                    .as_ref()
                    .and_then(|p| p.last_price)
                    .map(|price| {
                        if is_option {
                            price * OPTION_MULTIPLIER
                        } else {
                            price
                        }
                    }),
            };
            if let Some(mark) = mark {
                snapshot.marks.insert(symbol.clone(), mark);
            }

            if is_option {
                snapshot.option_symbols.insert(symbol);
            } else {
                snapshot.stock_symbols.insert(symbol);
            }
        }
        tracing::debug!(
            "Portfolio snapshot: {} option contracts, {} stocks",
            snapshot.option_symbols.len(),
            snapshot.stock_symbols.len()
        );
        snapshot
    }

    pub fn holds_option(&self, symbol: &str) -> bool {
        self.option_symbols.contains(symbol)
    }

    pub fn holds_stock(&self, symbol: &str) -> bool {
        self.stock_symbols.contains(symbol)
    }

    pub fn mark(&self, symbol: &str) -> Option<f64> {
        self.marks.get(symbol).copied()
    }
}

/// Positions and synthetic close events of the summed-net-amount strategy.
#[derive(Debug, Clone, Default)]
pub struct NetAmountSummary {
    pub positions: Vec<PositionSummary>,
    pub closes: Vec<CloseEvent>,
}

#[derive(Default)]
struct SymbolTotals {
    net: f64,
    quantity: f64,
    bought: f64,
    sold: f64,
    inflow: f64,
    outflow: f64,
    first: Option<Side>,
    last_trade_id: String,
    last_at: Option<DateTime<Utc>>,
}

impl SymbolTotals {
    fn add(&mut self, trade: &TradeRecord) {
        self.net += trade.net_amount;
        match trade.side {
            Side::Buy => {
                self.quantity += trade.quantity;
                self.bought += trade.quantity;
            }
            Side::Sell => {
                self.quantity -= trade.quantity;
                self.sold += trade.quantity;
            }
        }
        if trade.net_amount >= 0.0 {
            self.inflow += trade.net_amount;
        } else {
            self.outflow -= trade.net_amount;
        }
        self.first.get_or_insert(trade.side);
        self.last_trade_id = trade.id.clone();
        self.last_at = Some(trade.timestamp);
    }

    fn close_event(&self, instrument: &Instrument) -> Option<CloseEvent> {
        let closed_at = self.last_at?;
        let direction = match self.first {
            Some(Side::Sell) => Direction::Short,
            _ => Direction::Long,
        };
        Some(CloseEvent {
            trade_id: self.last_trade_id.clone(),
            symbol: instrument.symbol().to_string(),
            instrument: instrument.clone(),
            closed_at,
            direction,
            quantity: self.bought.max(self.sold),
            proceeds: self.inflow,
            cost_basis: self.outflow,
            realized_pnl: self.net,
            short_term_pnl: self.net,
            long_term_pnl: 0.0,
            matches: Vec::new(),
        })
    }
}

fn sorted_by_time(trades: &[TradeRecord]) -> Vec<&TradeRecord> {
    let mut ordered: Vec<&TradeRecord> = trades.iter().collect();
    ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    ordered
}

/// Sums `net_amount` per option contract and per stock symbol.
///
/// A contract still held is open and its sum is unrealized. A put that is no
/// longer held while its underlying is held as stock counts as assigned, and
/// its premium is excluded. Every other contract is closed, realized
/// short-term. Stocks that are no longer held are closed with their sum;
/// held stocks are left out.
pub fn net_amount_summary(trades: &[TradeRecord], snapshot: &PortfolioSnapshot) -> NetAmountSummary {
    let mut options: BTreeMap<String, (Instrument, SymbolTotals)> = BTreeMap::new();
    let mut stocks: BTreeMap<String, (Instrument, SymbolTotals)> = BTreeMap::new();

    for trade in sorted_by_time(trades) {
        let bucket = if trade.instrument.is_option() {
            &mut options
        } else {
            &mut stocks
        };
        bucket
            .entry(trade.symbol().to_string())
            .or_insert_with(|| (trade.instrument.clone(), SymbolTotals::default()))
            .1
            .add(trade);
    }

    let mut summary = NetAmountSummary::default();
    for (symbol, (instrument, totals)) in &options {
        let Some(contract) = instrument.option() else {
            continue;
        };
        let assigned = !snapshot.holds_option(symbol)
            && contract.is_put()
            && snapshot.holds_stock(&contract.underlying);

        if snapshot.holds_option(symbol) {
            summary.positions.push(PositionSummary {
                symbol: symbol.clone(),
                kind: PositionKind::Option,
                status: PositionStatus::Open,
                realized_pl: 0.0,
                unrealized_pl: totals.net,
                quantity: totals.quantity,
                term: None,
                excluded_amount: None,
                note: Some("Open position".to_string()),
            });
        } else if assigned {
            summary.positions.push(PositionSummary {
                symbol: symbol.clone(),
                kind: PositionKind::Option,
                status: PositionStatus::Assigned,
                realized_pl: 0.0,
                unrealized_pl: 0.0,
                quantity: 0.0,
                term: None,
                excluded_amount: Some(totals.net),
                note: Some(ASSIGNED_NOTE.to_string()),
            });
        } else {
            summary.positions.push(PositionSummary {
                symbol: symbol.clone(),
                kind: PositionKind::Option,
                status: PositionStatus::Closed,
                realized_pl: totals.net,
                unrealized_pl: 0.0,
                quantity: 0.0,
                term: Some(HoldingTerm::ShortTerm),
                excluded_amount: None,
                note: None,
            });
            summary.closes.extend(totals.close_event(instrument));
        }
    }

    for (symbol, (instrument, totals)) in &stocks {
        if snapshot.holds_stock(symbol) {
            continue;
        }
        summary.positions.push(PositionSummary {
            symbol: symbol.clone(),
            kind: PositionKind::Stock,
            status: PositionStatus::Closed,
            realized_pl: totals.net,
            unrealized_pl: 0.0,
            quantity: 0.0,
            term: Some(HoldingTerm::ShortTerm),
            excluded_amount: None,
            note: None,
        });
        summary.closes.extend(totals.close_event(instrument));
    }

    summary
        .closes
        .sort_by(|a, b| a.closed_at.cmp(&b.closed_at).then_with(|| a.trade_id.cmp(&b.trade_id)));
    summary
}

pub(crate) const ASSIGNED_NOTE: &str = "Assigned - premium reduces stock cost basis";
pub(crate) const EXPIRED_NOTE: &str = "Expired worthless";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementKind {
    Assigned,
    Expired,
}

/// An option position closed by expiry rather than by a trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub symbol: String,
    pub kind: SettlementKind,
    pub quantity: f64,
    /// Realized P&L for an expiry; the signed premium left out for an assignment.
    pub amount: f64,
}

/// Settles option lots that are still open in the ledger but gone from the
/// account, whether or not the contract has reached its expiry date.
///
/// Puts whose underlying is held are treated as assigned: their lots are
/// removed and the premium is excluded. Everything else is realized at zero,
/// stamped at expiry end of day or `as_of`, whichever comes first.
pub fn settle_expired(
    ledger: &mut Ledger,
    snapshot: &PortfolioSnapshot,
    as_of: DateTime<Utc>,
) -> Vec<Settlement> {
    let long_term_days = ledger.long_term_days;
    let mut settlements = Vec::new();

    for (symbol, position) in ledger.positions.iter_mut() {
        let Some(contract) = position.instrument.option().cloned() else {
            continue;
        };
        if position.is_flat() || snapshot.holds_option(symbol) {
            continue;
        }
        let quantity = position.shares_held().abs();

        if contract.is_put() && snapshot.holds_stock(&contract.underlying) {
            let excluded: f64 = position
                .take_lots()
                .iter()
                .map(|lot| match lot.direction {
                    Direction::Long => -lot.total_cash(),
                    Direction::Short => lot.total_cash(),
                })
                .sum();
            tracing::info!("{} assigned; excluding {:.2} of premium", symbol, excluded);
            settlements.push(Settlement {
                symbol: symbol.clone(),
                kind: SettlementKind::Assigned,
                quantity,
                amount: excluded,
            });
            continue;
        }

        let expiry_close = contract
            .expiry
            .and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
            .and_utc();
        let closed_at = expiry_close.min(as_of);
        let close_id = format!("{}:expired", symbol);
        if let Some(event) = position.close_all(&close_id, closed_at, 0.0, long_term_days) {
            tracing::info!(
                "{} expired worthless; realized {:.2}",
                symbol,
                event.realized_pnl
            );
            settlements.push(Settlement {
                symbol: symbol.clone(),
                kind: SettlementKind::Expired,
                quantity,
                amount: event.realized_pnl,
            });
            ledger.closes.push(event);
        }
    }

    ledger
        .closes
        .sort_by(|a, b| a.closed_at.cmp(&b.closed_at).then_with(|| a.trade_id.cmp(&b.trade_id)));
    settlements
}

/// Option contracts sharing an underlying and expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadGroup {
    /// `UNDERLYING_YYMMDD`.
    pub key: String,
    pub underlying: String,
    pub expiry: NaiveDate,
    pub contracts: Vec<String>,
    pub net_amount: f64,
    /// True while any leg is still held.
    pub open: bool,
}

pub fn spread_groups(trades: &[TradeRecord], snapshot: &PortfolioSnapshot) -> Vec<SpreadGroup> {
    let mut groups: BTreeMap<String, SpreadGroup> = BTreeMap::new();
    for trade in trades {
        let Some(contract) = trade.instrument.option() else {
            continue;
        };
        let group = groups
            .entry(contract.spread_key())
            .or_insert_with(|| SpreadGroup {
                key: contract.spread_key(),
                underlying: contract.underlying.clone(),
                expiry: contract.expiry,
                contracts: Vec::new(),
                net_amount: 0.0,
                open: false,
            });
        if !group.contracts.contains(&contract.symbol) {
            group.contracts.push(contract.symbol.clone());
        }
        group.net_amount += trade.net_amount;
        group.open |= snapshot.holds_option(&contract.symbol);
    }
    groups
        .into_values()
        .map(|mut group| {
            group.contracts.sort();
            group
        })
        .collect()
}
