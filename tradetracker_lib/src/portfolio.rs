//! Lot matching for position tracking and realized P&L.
//!
//! Processes chronologically-ordered trades and maintains one queue of open
//! lots per symbol. Closing trades consume lots oldest-first (FIFO) or
//! newest-first (LIFO), splitting the last lot touched on a partial fill.
//! A closing trade larger than the open quantity flips the position: the
//! remainder opens a lot in the trade's own direction, which is how short
//! positions (sold options, short stock) come into existence.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trade::{Instrument, Side, TradeRecord};

/// Epsilon constant for floating-point quantity comparisons.
pub const EPSILON: f64 = 0.0001;

/// Holding period, in days, beyond which a gain counts as long-term.
pub const DEFAULT_LONG_TERM_DAYS: i64 = 365;

/// Which open lot a closing trade consumes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    #[default]
    Fifo,
    Lifo,
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                MatchMethod::Fifo => "fifo",
                MatchMethod::Lifo => "lifo",
            }
        )
    }
}

impl FromStr for MatchMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fifo" => Ok(MatchMethod::Fifo),
            "lifo" => Ok(MatchMethod::Lifo),
            other => Err(format!("unknown matching method '{}'", other)),
        }
    }
}

/// Long lots are opened by buys, short lots by sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl From<Side> for Direction {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => Direction::Long,
            Side::Sell => Direction::Short,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingTerm {
    ShortTerm,
    LongTerm,
}

/// A single open lot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    pub trade_id: String,
    pub opened_at: DateTime<Utc>,
    pub quantity: f64,
    /// Cash paid (long) or received (short) per unit, fees included.
    pub unit_cash: f64,
    pub direction: Direction,
}

impl Lot {
    pub fn total_cash(&self) -> f64 {
        self.quantity * self.unit_cash
    }
}

/// The slice of one lot consumed by a closing trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotMatch {
    pub open_trade_id: String,
    pub opened_at: DateTime<Utc>,
    pub quantity: f64,
    pub open_unit_cash: f64,
    pub close_unit_cash: f64,
    pub realized_pnl: f64,
    pub holding_days: i64,
    pub term: HoldingTerm,
}

/// Everything one closing trade realized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseEvent {
    pub trade_id: String,
    pub symbol: String,
    pub instrument: Instrument,
    pub closed_at: DateTime<Utc>,
    /// Direction of the lots that were closed.
    pub direction: Direction,
    pub quantity: f64,
    pub proceeds: f64,
    pub cost_basis: f64,
    pub realized_pnl: f64,
    pub short_term_pnl: f64,
    pub long_term_pnl: f64,
    pub matches: Vec<LotMatch>,
}

impl CloseEvent {
    fn from_matches(
        trade_id: String,
        instrument: &Instrument,
        closed_at: DateTime<Utc>,
        direction: Direction,
        matches: Vec<LotMatch>,
    ) -> Self {
        let mut quantity = 0.0;
        let mut proceeds = 0.0;
        let mut cost_basis = 0.0;
        let mut short_term_pnl = 0.0;
        let mut long_term_pnl = 0.0;
        for m in &matches {
            quantity += m.quantity;
            let (p, c) = match direction {
                Direction::Long => (m.close_unit_cash, m.open_unit_cash),
                Direction::Short => (m.open_unit_cash, m.close_unit_cash),
            };
            proceeds += p * m.quantity;
            cost_basis += c * m.quantity;
            match m.term {
                HoldingTerm::ShortTerm => short_term_pnl += m.realized_pnl,
                HoldingTerm::LongTerm => long_term_pnl += m.realized_pnl,
            }
        }
        Self {
            trade_id,
            symbol: instrument.symbol().to_string(),
            instrument: instrument.clone(),
            closed_at,
            direction,
            quantity,
            proceeds,
            cost_basis,
            realized_pnl: short_term_pnl + long_term_pnl,
            short_term_pnl,
            long_term_pnl,
            matches,
        }
    }
}

/// Open lots and realized P&L for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub instrument: Instrument,
    pub lots: VecDeque<Lot>,
    pub realized_pnl: f64,
}

impl Position {
    pub fn new(instrument: Instrument) -> Self {
        Self {
            symbol: instrument.symbol().to_string(),
            instrument,
            lots: VecDeque::new(),
            realized_pnl: 0.0,
        }
    }

    /// Direction of the open lots, or `None` when flat.
    pub fn direction(&self) -> Option<Direction> {
        self.lots.front().map(|lot| lot.direction)
    }

    pub fn is_flat(&self) -> bool {
        self.lots.iter().all(|lot| lot.quantity < EPSILON)
    }

    /// Signed open quantity: positive when long, negative when short.
    pub fn shares_held(&self) -> f64 {
        self.lots
            .iter()
            .map(|lot| match lot.direction {
                Direction::Long => lot.quantity,
                Direction::Short => -lot.quantity,
            })
            .sum()
    }

    /// Quantity-weighted cash per unit of the open lots.
    pub fn avg_cost_basis(&self) -> f64 {
        let quantity: f64 = self.lots.iter().map(|lot| lot.quantity).sum();
        if quantity < EPSILON {
            return 0.0;
        }
        self.lots.iter().map(Lot::total_cash).sum::<f64>() / quantity
    }

    pub fn open_lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter()
    }

    /// Applies one trade. Returns the close event when the trade consumed lots.
    pub fn apply(
        &mut self,
        trade: &TradeRecord,
        method: MatchMethod,
        long_term_days: i64,
    ) -> Option<CloseEvent> {
        let trade_direction = Direction::from(trade.side);
        let unit_cash = trade.unit_cash();
        let mut remaining = trade.quantity;
        let mut matches = Vec::new();
        let closing = self
            .direction()
            .map(|d| d != trade_direction)
            .unwrap_or(false);

        if closing {
            while remaining > EPSILON {
                let lot = match method {
                    MatchMethod::Fifo => self.lots.front_mut(),
                    MatchMethod::Lifo => self.lots.back_mut(),
                };
                let Some(lot) = lot else {
                    break;
                };

                let quantity = remaining.min(lot.quantity);
                let realized_pnl = match lot.direction {
                    Direction::Long => (unit_cash - lot.unit_cash) * quantity,
                    Direction::Short => (lot.unit_cash - unit_cash) * quantity,
                };
                let holding_days = (trade.timestamp - lot.opened_at).num_days();
                let term = if holding_days > long_term_days {
                    HoldingTerm::LongTerm
                } else {
                    HoldingTerm::ShortTerm
                };
                tracing::debug!(
                    "{}: {} {:.4} from lot {} ({:.4} -> {:.4}) = {:.2}",
                    self.symbol,
                    method,
                    quantity,
                    lot.trade_id,
                    lot.unit_cash,
                    unit_cash,
                    realized_pnl
                );
                matches.push(LotMatch {
                    open_trade_id: lot.trade_id.clone(),
                    opened_at: lot.opened_at,
                    quantity,
                    open_unit_cash: lot.unit_cash,
                    close_unit_cash: unit_cash,
                    realized_pnl,
                    holding_days,
                    term,
                });

                lot.quantity -= quantity;
                remaining -= quantity;
                if lot.quantity < EPSILON {
                    match method {
                        MatchMethod::Fifo => self.lots.pop_front(),
                        MatchMethod::Lifo => self.lots.pop_back(),
                    };
                }
            }
        }

        if remaining > EPSILON {
            if closing {
                tracing::warn!(
                    "{}: trade {} closes {:.4} more than held; opening {:?} lot with the remainder",
                    self.symbol,
                    trade.id,
                    remaining,
                    trade_direction
                );
            }
            self.lots.push_back(Lot {
                trade_id: trade.id.clone(),
                opened_at: trade.timestamp,
                quantity: remaining,
                unit_cash,
                direction: trade_direction,
            });
        }

        if matches.is_empty() {
            return None;
        }
        let event = CloseEvent::from_matches(
            trade.id.clone(),
            &self.instrument,
            trade.timestamp,
            trade_direction.opposite(),
            matches,
        );
        self.realized_pnl += event.realized_pnl;
        Some(event)
    }

    /// Closes every open lot at `close_unit_cash`, e.g. an option expiring
    /// worthless at zero.
    pub fn close_all(
        &mut self,
        close_id: &str,
        closed_at: DateTime<Utc>,
        close_unit_cash: f64,
        long_term_days: i64,
    ) -> Option<CloseEvent> {
        let direction = self.direction()?;
        let side = match direction {
            Direction::Long => Side::Sell,
            Direction::Short => Side::Buy,
        };
        let quantity: f64 = self.lots.iter().map(|lot| lot.quantity).sum();
        let closing_trade = TradeRecord {
            id: close_id.to_string(),
            timestamp: closed_at,
            instrument: self.instrument.clone(),
            side,
            quantity,
            net_amount: close_unit_cash * quantity,
            price: None,
        };
        self.apply(&closing_trade, MatchMethod::Fifo, long_term_days)
    }

    /// Removes the open lots without realizing them.
    pub fn take_lots(&mut self) -> Vec<Lot> {
        self.lots.drain(..).collect()
    }
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

/// Result of running every trade through the matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    pub method: MatchMethod,
    pub long_term_days: i64,
    pub positions: BTreeMap<String, Position>,
    pub closes: Vec<CloseEvent>,
}

impl Ledger {
    pub fn realized_pnl(&self) -> f64 {
        self.closes.iter().map(|c| c.realized_pnl).sum()
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Positions that still hold lots.
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values().filter(|p| !p.is_flat())
    }
}

/// Runs trades through per-symbol lot queues.
#[derive(Debug, Clone, Copy)]
pub struct LotMatcher {
    pub method: MatchMethod,
    pub long_term_days: i64,
}

impl LotMatcher {
    pub fn new(method: MatchMethod) -> Self {
        Self {
            method,
            long_term_days: DEFAULT_LONG_TERM_DAYS,
        }
    }

    pub fn with_long_term_days(mut self, days: i64) -> Self {
        self.long_term_days = days;
        self
    }

    /// Sorts trades chronologically (ties broken by id) and matches them.
    pub fn run(&self, mut trades: Vec<TradeRecord>) -> Ledger {
        trades.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut positions: BTreeMap<String, Position> = BTreeMap::new();
        let mut closes = Vec::new();
        for trade in &trades {
            if trade.quantity < EPSILON {
                tracing::warn!("Skipping zero-quantity trade {}", trade.id);
                continue;
            }
            let position = positions
                .entry(trade.symbol().to_string())
                .or_insert_with(|| Position::new(trade.instrument.clone()));
            if let Some(event) = position.apply(trade, self.method, self.long_term_days) {
                closes.push(event);
            }
        }

        Ledger {
            method: self.method,
            long_term_days: self.long_term_days,
            positions,
            closes,
        }
    }
}

/// Matches trades with the default long-term threshold.
pub fn calculate_positions(trades: Vec<TradeRecord>, method: MatchMethod) -> Ledger {
    LotMatcher::new(method).run(trades)
}
