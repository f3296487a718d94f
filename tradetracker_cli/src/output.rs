use anyhow::{bail, Result};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tradetracker_lib::db::KindCount;
use tradetracker_lib::portfolio::{Direction, HoldingTerm};
use tradetracker_lib::{CloseEvent, HistorySummary, PnlReport, PositionSummary};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    Markdown,
}

impl OutputFormat {
    pub fn parse(input: &str) -> Result<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => bail!(
                "unknown output format '{}'. Valid values: table, json, csv, markdown",
                other
            ),
        }
    }
}

#[derive(Tabled, Serialize)]
struct PositionRow {
    #[tabled(rename = "Symbol")]
    #[serde(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Kind")]
    #[serde(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Status")]
    #[serde(rename = "Status")]
    status: String,
    #[tabled(rename = "Qty")]
    #[serde(rename = "Qty")]
    quantity: String,
    #[tabled(rename = "Realized")]
    #[serde(rename = "Realized")]
    realized: String,
    #[tabled(rename = "Unrealized")]
    #[serde(rename = "Unrealized")]
    unrealized: String,
    #[tabled(rename = "Note")]
    #[serde(rename = "Note")]
    note: String,
}

#[derive(Tabled, Serialize)]
struct CloseRow {
    #[tabled(rename = "Closed")]
    #[serde(rename = "Closed")]
    closed_at: String,
    #[tabled(rename = "Symbol")]
    #[serde(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Position")]
    #[serde(rename = "Position")]
    direction: String,
    #[tabled(rename = "Qty")]
    #[serde(rename = "Qty")]
    quantity: String,
    #[tabled(rename = "Proceeds")]
    #[serde(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Cost")]
    #[serde(rename = "Cost")]
    cost: String,
    #[tabled(rename = "P&L")]
    #[serde(rename = "P&L")]
    realized: String,
    #[tabled(rename = "Term")]
    #[serde(rename = "Term")]
    term: String,
}

#[derive(Tabled, Serialize)]
struct KindRow {
    #[tabled(rename = "Type")]
    #[serde(rename = "Type")]
    kind: String,
    #[tabled(rename = "Count")]
    #[serde(rename = "Count")]
    count: i64,
    #[tabled(rename = "Example")]
    #[serde(rename = "Example")]
    example: String,
}

// -- Row builders --

fn build_position_rows(positions: &[PositionSummary]) -> Vec<PositionRow> {
    positions
        .iter()
        .map(|p| PositionRow {
            symbol: p.symbol.clone(),
            kind: p.kind.to_string(),
            status: p.status.to_string(),
            quantity: format_quantity(p.quantity),
            realized: format_money(p.realized_pl),
            unrealized: format_money(p.unrealized_pl),
            note: match (&p.note, p.excluded_amount) {
                (Some(note), Some(excluded)) => {
                    format!("{} ({} excluded)", note, format_money(excluded))
                }
                (Some(note), None) => note.clone(),
                (None, _) => String::new(),
            },
        })
        .collect()
}

fn build_close_rows(closes: &[CloseEvent]) -> Vec<CloseRow> {
    closes
        .iter()
        .map(|c| CloseRow {
            closed_at: c.closed_at.format("%Y-%m-%d").to_string(),
            symbol: c.symbol.clone(),
            direction: match c.direction {
                Direction::Long => "long".to_string(),
                Direction::Short => "short".to_string(),
            },
            quantity: format_quantity(c.quantity),
            proceeds: format_money(c.proceeds),
            cost: format_money(c.cost_basis),
            realized: format_money(c.realized_pnl),
            term: term_label(c),
        })
        .collect()
}

fn build_kind_rows(summary: &HistorySummary) -> Vec<KindRow> {
    summary
        .samples_by_type
        .iter()
        .map(|(kind, samples)| KindRow {
            kind: kind.clone(),
            count: summary.counts_by_type.get(kind).copied().unwrap_or(samples.len()) as i64,
            example: samples
                .first()
                .map(|s| s.description.clone())
                .unwrap_or_default(),
        })
        .collect()
}

fn build_stored_kind_rows(counts: &[KindCount]) -> Vec<KindRow> {
    counts
        .iter()
        .map(|c| KindRow {
            kind: c.kind.clone(),
            count: c.count,
            example: String::new(),
        })
        .collect()
}

fn term_label(close: &CloseEvent) -> String {
    let has_short = close.matches.iter().any(|m| m.term == HoldingTerm::ShortTerm);
    let has_long = close.matches.iter().any(|m| m.term == HoldingTerm::LongTerm);
    match (has_short, has_long) {
        (true, true) => "mixed".to_string(),
        (false, true) => "long".to_string(),
        _ => "short".to_string(),
    }
}

// -- Rendering --

fn print_rows<R: Tabled + Serialize>(rows: Vec<R>, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", Table::new(rows)),
        OutputFormat::Markdown => {
            let mut table = Table::new(rows);
            table.with(Style::markdown());
            println!("{}", table);
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            for row in rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
        }
        OutputFormat::Json => print_json(&rows),
    }
    Ok(())
}

pub fn print_report(report: &PnlReport, format: &OutputFormat) -> Result<()> {
    if *format == OutputFormat::Json {
        print_json(report);
        return Ok(());
    }
    print_rows(build_position_rows(&report.positions), format)?;
    if *format != OutputFormat::Csv {
        println!();
        for line in report_totals(report) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn report_totals(report: &PnlReport) -> Vec<String> {
    let mut lines = vec![
        format!("Strategy:         {}", report.strategy),
        format!("Realized P&L:     {}", format_money(report.total_realized_pl)),
        format!("  short-term:     {}", format_money(report.short_term_pl)),
        format!("  long-term:      {}", format_money(report.long_term_pl)),
        format!("Unrealized P&L:   {}", format_money(report.total_unrealized_pl)),
    ];
    if report.total_excluded.abs() > f64::EPSILON {
        lines.push(format!(
            "Excluded premium: {}",
            format_money(report.total_excluded)
        ));
    }
    lines.push(format!(
        "Updated:          {}",
        report.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines
}

pub fn print_closes(closes: &[CloseEvent], format: &OutputFormat) -> Result<()> {
    if *format == OutputFormat::Json {
        print_json(&closes);
        return Ok(());
    }
    print_rows(build_close_rows(closes), format)
}

pub fn print_history(summary: &HistorySummary, format: &OutputFormat) -> Result<()> {
    if *format == OutputFormat::Json {
        print_json(summary);
        return Ok(());
    }
    print_rows(build_kind_rows(summary), format)?;
    eprintln!("{} transactions in window", summary.total_transactions);
    Ok(())
}

pub fn print_stored_kinds(counts: &[KindCount], format: &OutputFormat) -> Result<()> {
    print_rows(build_stored_kind_rows(counts), format)
}

// -- JSON output --

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}

fn format_money(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, frac)
}

fn format_quantity(value: f64) -> String {
    if (value - value.round()).abs() < 1e-6 {
        format!("{}", value.round() as i64)
    } else {
        format!("{:.4}", value)
    }
}
