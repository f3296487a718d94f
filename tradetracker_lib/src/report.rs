//! P&L report assembly and derived statistics.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::portfolio::{
    CloseEvent, Direction, HoldingTerm, LotMatcher, MatchMethod, Position, DEFAULT_LONG_TERM_DAYS,
    EPSILON,
};
use crate::reconcile::{
    net_amount_summary, settle_expired, spread_groups, PortfolioSnapshot, Settlement,
    SettlementKind, SpreadGroup, ASSIGNED_NOTE, EXPIRED_NOTE,
};
use crate::trade::TradeRecord;

/// How realized P&L is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Strategy {
    /// Lot matching with the given discipline.
    Lots(MatchMethod),
    /// Summed net cash per symbol, classified against the portfolio.
    NetAmount,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Lots(MatchMethod::Fifo)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Lots(method) => write!(f, "{}", method),
            Strategy::NetAmount => write!(f, "net"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "net" | "net_amount" => Ok(Strategy::NetAmount),
            other => other
                .parse::<MatchMethod>()
                .map(Strategy::Lots)
                .map_err(|_| format!("unknown strategy '{}' (expected fifo, lifo or net)", s.trim())),
        }
    }
}

impl TryFrom<String> for Strategy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Strategy> for String {
    fn from(strategy: Strategy) -> Self {
        strategy.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionKind {
    Stock,
    Option,
}

impl fmt::Display for PositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionKind::Stock => write!(f, "stock"),
            PositionKind::Option => write!(f, "option"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
    Assigned,
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionStatus::Open => write!(f, "open"),
            PositionStatus::Closed => write!(f, "closed"),
            PositionStatus::Assigned => write!(f, "assigned"),
        }
    }
}

/// One row of the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSummary {
    pub symbol: String,
    pub kind: PositionKind,
    pub status: PositionStatus,
    pub realized_pl: f64,
    pub unrealized_pl: f64,
    /// Signed open quantity; zero once closed.
    pub quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<HoldingTerm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlReport {
    pub strategy: Strategy,
    pub total_realized_pl: f64,
    pub short_term_pl: f64,
    pub long_term_pl: f64,
    pub total_unrealized_pl: f64,
    /// Premium left out of P&L because the contract was assigned.
    pub total_excluded: f64,
    pub total_positions: usize,
    pub positions: Vec<PositionSummary>,
    pub closes: Vec<CloseEvent>,
    #[serde(default)]
    pub settlements: Vec<Settlement>,
    pub spread_groups: Vec<SpreadGroup>,
    pub portfolio_option_symbols: Vec<String>,
    pub portfolio_stock_symbols: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

/// Builds a report with the default long-term threshold.
pub fn build_report(
    trades: Vec<TradeRecord>,
    snapshot: &PortfolioSnapshot,
    strategy: Strategy,
    as_of: DateTime<Utc>,
) -> PnlReport {
    build_report_with_term(trades, snapshot, strategy, DEFAULT_LONG_TERM_DAYS, as_of)
}

pub fn build_report_with_term(
    trades: Vec<TradeRecord>,
    snapshot: &PortfolioSnapshot,
    strategy: Strategy,
    long_term_days: i64,
    as_of: DateTime<Utc>,
) -> PnlReport {
    let groups = spread_groups(&trades, snapshot);

    let (positions, closes, settlements) = match strategy {
        Strategy::NetAmount => {
            let summary = net_amount_summary(&trades, snapshot);
            (summary.positions, summary.closes, Vec::new())
        }
        Strategy::Lots(method) => {
            let mut ledger = LotMatcher::new(method)
                .with_long_term_days(long_term_days)
                .run(trades);
            let settlements = settle_expired(&mut ledger, snapshot, as_of);
            let positions: Vec<PositionSummary> = ledger
                .positions
                .values()
                .map(|position| summarize_position(position, &ledger.closes, &settlements, snapshot))
                .collect();
            (positions, ledger.closes, settlements)
        }
    };

    let mut report = PnlReport {
        strategy,
        total_realized_pl: 0.0,
        short_term_pl: closes.iter().fold(0.0, |acc, c| acc + c.short_term_pnl),
        long_term_pl: closes.iter().fold(0.0, |acc, c| acc + c.long_term_pnl),
        total_unrealized_pl: positions.iter().fold(0.0, |acc, p| acc + p.unrealized_pl),
        total_excluded: positions
            .iter()
            .filter_map(|p| p.excluded_amount)
            .fold(0.0, |acc, x| acc + x),
        total_positions: positions.len(),
        positions,
        closes,
        settlements,
        spread_groups: groups,
        portfolio_option_symbols: snapshot.option_symbols.iter().cloned().collect(),
        portfolio_stock_symbols: snapshot.stock_symbols.iter().cloned().collect(),
        last_updated: as_of,
    };
    report.total_realized_pl = report.short_term_pl + report.long_term_pl;
    tracing::info!(
        "Report ({}): realized {:.2}, unrealized {:.2}, {} positions",
        report.strategy,
        report.total_realized_pl,
        report.total_unrealized_pl,
        report.total_positions
    );
    report
}

fn summarize_position(
    position: &Position,
    closes: &[CloseEvent],
    settlements: &[Settlement],
    snapshot: &PortfolioSnapshot,
) -> PositionSummary {
    let kind = if position.instrument.is_option() {
        PositionKind::Option
    } else {
        PositionKind::Stock
    };
    let settlement = settlements.iter().find(|s| s.symbol == position.symbol);

    if !position.is_flat() {
        let quantity = position.shares_held();
        let (unrealized_pl, note) = match snapshot.mark(&position.symbol) {
            Some(mark) => {
                let pnl: f64 = position
                    .open_lots()
                    .map(|lot| match lot.direction {
                        Direction::Long => (mark - lot.unit_cash) * lot.quantity,
                        Direction::Short => (lot.unit_cash - mark) * lot.quantity,
                    })
                    .sum();
                (pnl, "Open position".to_string())
            }
            None => (0.0, "Open position, no market price".to_string()),
        };
        return PositionSummary {
            symbol: position.symbol.clone(),
            kind,
            status: PositionStatus::Open,
            realized_pl: position.realized_pnl,
            unrealized_pl,
            quantity,
            term: None,
            excluded_amount: None,
            note: Some(note),
        };
    }

    if let Some(settlement) = settlement.filter(|s| s.kind == SettlementKind::Assigned) {
        return PositionSummary {
            symbol: position.symbol.clone(),
            kind,
            status: PositionStatus::Assigned,
            realized_pl: position.realized_pnl,
            unrealized_pl: 0.0,
            quantity: 0.0,
            term: None,
            excluded_amount: Some(settlement.amount),
            note: Some(ASSIGNED_NOTE.to_string()),
        };
    }

    let (short, long) = closes
        .iter()
        .filter(|c| c.symbol == position.symbol)
        .fold((0.0, 0.0), |(s, l), c| {
            (s + c.short_term_pnl.abs(), l + c.long_term_pnl.abs())
        });
    let term = if long > short && long > EPSILON {
        HoldingTerm::LongTerm
    } else {
        HoldingTerm::ShortTerm
    };
    PositionSummary {
        symbol: position.symbol.clone(),
        kind,
        status: PositionStatus::Closed,
        realized_pl: position.realized_pnl,
        unrealized_pl: 0.0,
        quantity: 0.0,
        term: Some(term),
        excluded_amount: None,
        note: settlement.map(|_| EXPIRED_NOTE.to_string()),
    }
}

/// Month-to-date and year-to-date realized figures on top of a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    #[serde(flatten)]
    pub report: PnlReport,
    pub mtd_realized_pl: f64,
    pub mtd_short_term: f64,
    pub mtd_long_term: f64,
    pub mtd_closed: usize,
    pub ytd_realized_pl: f64,
    pub ytd_short_term: f64,
    pub ytd_long_term: f64,
    pub ytd_closed: usize,
}

#[derive(Default)]
struct PeriodTotals {
    short_term: f64,
    long_term: f64,
    closed: usize,
}

impl PeriodTotals {
    fn since(closes: &[CloseEvent], start: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        closes
            .iter()
            .filter(|c| c.closed_at >= start && c.closed_at <= now)
            .fold(Self::default(), |mut acc, c| {
                acc.short_term += c.short_term_pnl;
                acc.long_term += c.long_term_pnl;
                acc.closed += 1;
                acc
            })
    }
}

fn start_of_day(date: Option<NaiveDate>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    date.and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or(fallback)
}

impl Stats {
    /// Buckets close events by their close time into the current month and year.
    pub fn from_report(report: &PnlReport, now: DateTime<Utc>) -> Self {
        let month_start = start_of_day(NaiveDate::from_ymd_opt(now.year(), now.month(), 1), now);
        let year_start = start_of_day(NaiveDate::from_ymd_opt(now.year(), 1, 1), now);
        let mtd = PeriodTotals::since(&report.closes, month_start, now);
        let ytd = PeriodTotals::since(&report.closes, year_start, now);

        Self {
            report: report.clone(),
            mtd_realized_pl: mtd.short_term + mtd.long_term,
            mtd_short_term: mtd.short_term,
            mtd_long_term: mtd.long_term,
            mtd_closed: mtd.closed,
            ytd_realized_pl: ytd.short_term + ytd.long_term,
            ytd_short_term: ytd.short_term,
            ytd_long_term: ytd.long_term,
            ytd_closed: ytd.closed,
        }
    }
}

/// Close events from the last `days` days, newest first.
pub fn recent_closes(report: &PnlReport, days: i64, now: DateTime<Utc>) -> Vec<CloseEvent> {
    let cutoff = now - Duration::days(days);
    let mut recent: Vec<CloseEvent> = report
        .closes
        .iter()
        .filter(|c| c.closed_at >= cutoff && c.closed_at <= now)
        .cloned()
        .collect();
    recent.sort_by(|a, b| b.closed_at.cmp(&a.closed_at));
    recent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::OptionContract;
    use crate::trade::{Instrument, Side};
    use std::collections::HashMap;

    fn at(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, month, day, 15, 0, 0).unwrap()
    }

    fn trade(id: &str, symbol: &str, side: Side, qty: f64, net: f64, ts: DateTime<Utc>) -> TradeRecord {
        let instrument = match OptionContract::parse(symbol) {
            Some(contract) => Instrument::Option(contract),
            None => Instrument::Stock {
                symbol: symbol.to_string(),
            },
        };
        TradeRecord {
            id: id.to_string(),
            timestamp: ts,
            instrument,
            side,
            quantity: qty,
            net_amount: net,
            price: None,
        }
    }

    fn sample_trades() -> Vec<TradeRecord> {
        vec![
            trade("1", "NVDA", Side::Buy, 100.0, -17900.0, at(1, 5)),
            trade("2", "NVDA260123P00170000", Side::Sell, 1.0, 249.35, at(1, 6)),
            trade("3", "SOXL260130C00045000", Side::Buy, 2.0, -241.30, at(1, 8)),
            trade("4", "SOXL260130C00045000", Side::Sell, 2.0, 398.70, at(1, 12)),
            trade("5", "AMD", Side::Buy, 50.0, -6000.0, at(1, 15)),
            trade("6", "NVDA", Side::Sell, 60.0, 11100.0, at(1, 20)),
            trade("7", "GLD260227P00400000", Side::Sell, 1.0, 309.35, at(2, 2)),
        ]
    }

    fn sample_snapshot() -> PortfolioSnapshot {
        PortfolioSnapshot {
            option_symbols: ["GLD260227P00400000".to_string()].into_iter().collect(),
            stock_symbols: ["NVDA".to_string(), "AMD".to_string()].into_iter().collect(),
            marks: HashMap::from([
                ("NVDA".to_string(), 190.0),
                ("AMD".to_string(), 130.0),
                ("GLD260227P00400000".to_string(), 250.0),
            ]),
        }
    }

    #[test]
    fn fifo_report_totals() {
        let report = build_report(
            sample_trades(),
            &sample_snapshot(),
            Strategy::Lots(MatchMethod::Fifo),
            at(2, 15),
        );

        assert!((report.total_realized_pl - 517.40).abs() < 1e-6);
        assert!((report.short_term_pl - 517.40).abs() < 1e-6);
        assert_eq!(report.long_term_pl, 0.0);
        assert!((report.total_unrealized_pl - 999.35).abs() < 1e-6);
        assert!((report.total_excluded - 249.35).abs() < 1e-6);
        assert_eq!(report.total_positions, 5);

        let put = report
            .positions
            .iter()
            .find(|p| p.symbol == "NVDA260123P00170000")
            .unwrap();
        assert_eq!(put.status, PositionStatus::Assigned);
        let nvda = report.positions.iter().find(|p| p.symbol == "NVDA").unwrap();
        assert_eq!(nvda.status, PositionStatus::Open);
        assert!((nvda.quantity - 40.0).abs() < 1e-9);
        assert!((nvda.realized_pl - 360.0).abs() < 1e-6);
    }

    #[test]
    fn net_amount_report_totals() {
        let report = build_report(
            sample_trades(),
            &sample_snapshot(),
            Strategy::NetAmount,
            at(2, 15),
        );
        assert!((report.total_realized_pl - 157.40).abs() < 1e-6);
        assert!((report.total_unrealized_pl - 309.35).abs() < 1e-6);
        assert_eq!(report.total_positions, 3);
    }

    #[test]
    fn expired_option_is_closed_with_note() {
        let trades = vec![trade("1", "AMD260116C00150000", Side::Sell, 1.0, 80.0, at(1, 7))];
        let report = build_report(
            trades,
            &PortfolioSnapshot::default(),
            Strategy::Lots(MatchMethod::Fifo),
            at(2, 1),
        );
        assert!((report.total_realized_pl - 80.0).abs() < 1e-9);
        assert_eq!(report.positions[0].status, PositionStatus::Closed);
        assert_eq!(report.positions[0].note.as_deref(), Some(EXPIRED_NOTE));
        assert_eq!(report.settlements.len(), 1);
    }

    #[test]
    fn early_assignment_matches_net_strategy() {
        let trades = vec![
            trade("1", "NVDA", Side::Buy, 100.0, -17900.0, at(1, 5)),
            trade("2", "NVDA260320P00170000", Side::Sell, 1.0, 249.35, at(1, 6)),
        ];
        let snapshot = PortfolioSnapshot {
            option_symbols: Default::default(),
            stock_symbols: ["NVDA".to_string()].into_iter().collect(),
            marks: HashMap::from([("NVDA".to_string(), 190.0)]),
        };

        let lots = build_report(
            trades.clone(),
            &snapshot,
            Strategy::Lots(MatchMethod::Fifo),
            at(2, 15),
        );
        let net = build_report(trades, &snapshot, Strategy::NetAmount, at(2, 15));

        let lot_put = lots.positions.iter().find(|p| p.symbol == "NVDA260320P00170000").unwrap();
        let net_put = net.positions.iter().find(|p| p.symbol == "NVDA260320P00170000").unwrap();
        assert_eq!(lot_put.status, PositionStatus::Assigned);
        assert_eq!(net_put.status, PositionStatus::Assigned);
        assert!((lots.total_excluded - 249.35).abs() < 1e-9);
        assert!((net.total_excluded - 249.35).abs() < 1e-9);
    }

    #[test]
    fn expiry_day_close_counts_in_stats_and_recent() {
        let trades = vec![trade("1", "AMD260116C00150000", Side::Sell, 1.0, 80.0, at(1, 7))];
        let now = Utc.with_ymd_and_hms(2026, 1, 16, 18, 0, 0).unwrap();
        let report = build_report(
            trades,
            &PortfolioSnapshot::default(),
            Strategy::Lots(MatchMethod::Fifo),
            now,
        );
        let stats = Stats::from_report(&report, now);

        assert!((report.total_realized_pl - 80.0).abs() < 1e-9);
        assert!((stats.ytd_realized_pl - 80.0).abs() < 1e-9);
        assert_eq!(stats.ytd_closed, 1);
        assert_eq!(stats.mtd_closed, 1);
        assert_eq!(recent_closes(&report, 1, now).len(), 1);
    }

    #[test]
    fn empty_report_totals_are_positive_zero() {
        let report = build_report(
            Vec::new(),
            &PortfolioSnapshot::default(),
            Strategy::Lots(MatchMethod::Fifo),
            at(2, 15),
        );
        let json = serde_json::to_value(&report).unwrap();
        for key in ["total_excluded", "short_term_pl", "long_term_pl", "total_unrealized_pl"] {
            assert_eq!(json[key].to_string(), "0.0", "{key}");
        }
    }

    #[test]
    fn stats_split_month_and_year() {
        let report = build_report(
            sample_trades(),
            &sample_snapshot(),
            Strategy::Lots(MatchMethod::Fifo),
            at(2, 15),
        );
        let stats = Stats::from_report(&report, at(2, 15));

        assert_eq!(stats.ytd_closed, 2);
        assert!((stats.ytd_realized_pl - 517.40).abs() < 1e-6);
        assert_eq!(stats.mtd_closed, 0);
        assert_eq!(stats.mtd_realized_pl, 0.0);

        let json = serde_json::to_value(&stats).unwrap();
        assert!(json.get("total_realized_pl").is_some());
        assert!(json.get("mtd_closed").is_some());
    }

    #[test]
    fn recent_closes_window() {
        let report = build_report(
            sample_trades(),
            &sample_snapshot(),
            Strategy::Lots(MatchMethod::Fifo),
            at(2, 15),
        );
        let recent = recent_closes(&report, 10, at(1, 21));
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].trade_id, "6");
        assert_eq!(recent[1].trade_id, "4");
        assert!(recent_closes(&report, 1, at(1, 30)).is_empty());
    }

    #[test]
    fn strategy_parsing_and_serde() {
        assert_eq!("net".parse::<Strategy>().unwrap(), Strategy::NetAmount);
        assert_eq!("LIFO".parse::<Strategy>().unwrap(), Strategy::Lots(MatchMethod::Lifo));
        assert!("average".parse::<Strategy>().is_err());
        assert_eq!(serde_json::to_string(&Strategy::NetAmount).unwrap(), "\"net\"");
        let parsed: Strategy = serde_json::from_str("\"fifo\"").unwrap();
        assert_eq!(parsed, Strategy::Lots(MatchMethod::Fifo));
    }
}
