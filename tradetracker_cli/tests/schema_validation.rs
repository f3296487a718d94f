use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tradetracker_lib::describe::DescriptionParser;
use tradetracker_lib::trade::normalize_transactions;
use tradetracker_lib::types::{HistoryResponse, Portfolio};
use tradetracker_lib::{build_report, MatchMethod, PortfolioSnapshot, Stats, Strategy};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("CLI crate should be inside workspace")
        .to_path_buf()
}

fn load_fixture<T: serde::de::DeserializeOwned>(name: &str) -> T {
    let path = workspace_root()
        .join("brokerage_api/tests/fixtures")
        .join(name);
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("read fixture {}: {}", path.display(), e));
    serde_json::from_str(&text).expect("fixture is valid JSON")
}

fn load_schema() -> Value {
    let path = workspace_root().join("schema/report.schema.json");
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("read schema {}: {}", path.display(), e));
    serde_json::from_str(&text).expect("schema is valid JSON")
}

fn report_json(strategy: Strategy) -> Value {
    let history: HistoryResponse = load_fixture("history.json");
    let portfolio: Portfolio = load_fixture("portfolio.json");
    let parser = DescriptionParser::new().expect("patterns compile");
    let trades = normalize_transactions(&history.transactions, &parser);
    let as_of = Utc.with_ymd_and_hms(2026, 2, 15, 18, 0, 0).unwrap();
    let report = build_report(
        trades,
        &PortfolioSnapshot::from_portfolio(&portfolio),
        strategy,
        as_of,
    );
    serde_json::to_value(&report).expect("report serializes")
}

fn assert_valid(data: &Value) {
    let schema = load_schema();
    let validator = jsonschema::draft202012::new(&schema).expect("report schema compiles");
    if let Err(e) = validator.validate(data) {
        panic!("report failed validation: {e}");
    }
}

fn assert_invalid(data: &Value, why: &str) {
    let schema = load_schema();
    let validator = jsonschema::draft202012::new(&schema).expect("report schema compiles");
    assert!(validator.validate(data).is_err(), "{}", why);
}

// ---------------------------------------------------------------------------
// Positive validation: serialized reports conform to the schema
// ---------------------------------------------------------------------------

#[test]
fn test_fifo_report_conforms_to_schema() {
    assert_valid(&report_json(Strategy::Lots(MatchMethod::Fifo)));
}

#[test]
fn test_lifo_report_conforms_to_schema() {
    assert_valid(&report_json(Strategy::Lots(MatchMethod::Lifo)));
}

#[test]
fn test_net_report_conforms_to_schema() {
    assert_valid(&report_json(Strategy::NetAmount));
}

#[test]
fn test_stats_flatten_report_fields() {
    let history: HistoryResponse = load_fixture("history.json");
    let portfolio: Portfolio = load_fixture("portfolio.json");
    let parser = DescriptionParser::new().unwrap();
    let now = Utc.with_ymd_and_hms(2026, 2, 15, 18, 0, 0).unwrap();
    let report = build_report(
        normalize_transactions(&history.transactions, &parser),
        &PortfolioSnapshot::from_portfolio(&portfolio),
        Strategy::default(),
        now,
    );
    let mut stats = serde_json::to_value(Stats::from_report(&report, now)).unwrap();

    let obj = stats.as_object_mut().expect("stats is an object");
    for key in [
        "mtd_realized_pl",
        "mtd_short_term",
        "mtd_long_term",
        "mtd_closed",
        "ytd_realized_pl",
        "ytd_short_term",
        "ytd_long_term",
        "ytd_closed",
    ] {
        let value = obj.remove(key).unwrap_or_else(|| panic!("missing {key}"));
        assert!(value.is_number(), "{key} should be numeric");
    }
    assert_valid(&stats);
}

// ---------------------------------------------------------------------------
// Negative validation: schema rejects malformed reports
// ---------------------------------------------------------------------------

#[test]
fn test_schema_rejects_missing_totals() {
    let mut data = report_json(Strategy::default());
    data.as_object_mut()
        .expect("report is an object")
        .remove("total_realized_pl");
    assert_invalid(&data, "schema should reject report missing total_realized_pl");
}

#[test]
fn test_schema_rejects_unknown_strategy() {
    let mut data = report_json(Strategy::default());
    data["strategy"] = Value::String("average".to_string());
    assert_invalid(&data, "schema should reject unknown strategy");
}

#[test]
fn test_schema_rejects_invalid_status() {
    let mut data = report_json(Strategy::default());
    data["positions"][0]["status"] = Value::String("pending".to_string());
    assert_invalid(&data, "schema should reject invalid position status");
}

#[test]
fn test_schema_rejects_additional_properties() {
    let mut data = report_json(Strategy::default());
    data.as_object_mut()
        .expect("report is an object")
        .insert("bogusField".to_string(), Value::Number(123.into()));
    assert_invalid(&data, "schema should reject additional properties");
}

#[test]
fn test_schema_rejects_zero_quantity_lot_match() {
    let mut data = report_json(Strategy::default());
    data["closes"][0]["matches"][0]["quantity"] = serde_json::json!(0);
    assert_invalid(&data, "schema should reject empty lot matches");
}
