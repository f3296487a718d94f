use brokerage_api::types::{AccountsResponse, HistoryResponse, Portfolio};

fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
}

#[test]
fn deserialize_history_full() {
    let json = load_fixture("history.json");
    let resp: HistoryResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(resp.transactions.len(), 9);

    let first = &resp.transactions[0];
    assert_eq!(first.id, "tx-001");
    assert_eq!(first.tx_type, "TRADE");
    assert_eq!(first.sub_type.as_deref(), Some("TRADE"));
    assert_eq!(first.description, "BUY 100 NVDA at 179.00");
    assert_eq!(first.quantity, Some(100.0));
    assert_eq!(first.net_amount, Some(-17900.0));
    assert_eq!(first.fees, Some(0.0));
    assert!(first.is_trade());
    assert_eq!(first.timestamp.to_rfc3339(), "2026-01-05T14:30:00+00:00");

    let deposit = &resp.transactions[6];
    assert!(!deposit.is_trade());
    assert_eq!(deposit.kind_label(), "MONEY_MOVEMENT/DEPOSIT");
    assert_eq!(deposit.net_amount, Some(5000.0));
    assert!(deposit.quantity.is_none());
}

#[test]
fn deserialize_history_numeric_amounts() {
    let json = load_fixture("history_page1.json");
    let resp: HistoryResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(resp.next_token.as_deref(), Some("page-2"));
    assert_eq!(resp.transactions[0].net_amount, Some(-2000.0));
    assert!(resp.transactions[0].symbol.is_none());
}

#[test]
fn deserialize_history_empty() {
    let resp: HistoryResponse = serde_json::from_str("{}").unwrap();
    assert!(resp.transactions.is_empty());
    assert!(resp.next_token.is_none());
}

#[test]
fn deserialize_portfolio() {
    let json = load_fixture("portfolio.json");
    let portfolio: Portfolio = serde_json::from_str(&json).unwrap();
    assert_eq!(portfolio.account_id.as_deref(), Some("5LF05438"));
    assert_eq!(portfolio.positions.len(), 3);

    let nvda = &portfolio.positions[0];
    assert!(!nvda.is_option());
    assert_eq!(nvda.clean_symbol(), "NVDA");
    assert_eq!(nvda.quantity, Some(40.0));
    assert_eq!(nvda.current_value, Some(7600.0));
    assert_eq!(
        nvda.last_price.as_ref().and_then(|p| p.last_price),
        Some(190.0)
    );

    let put = &portfolio.positions[2];
    assert!(put.is_option());
    assert_eq!(put.clean_symbol(), "GLD260227P00400000");
    assert_eq!(put.quantity, Some(-1.0));
}

#[test]
fn deserialize_accounts() {
    let json = load_fixture("accounts.json");
    let resp: AccountsResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(resp.accounts[0].account_type, "HIGH_YIELD");
    assert_eq!(resp.brokerage_account().unwrap().account_id, "5LF05438");
}

#[test]
fn deserialize_malformed_json_returns_error() {
    let bad_json = r#"{"transactions": not valid json}"#;
    let result = serde_json::from_str::<HistoryResponse>(bad_json);
    assert!(result.is_err());
}

#[test]
fn deserialize_missing_required_fields_returns_error() {
    let json = r#"{"transactions": [{"type": "TRADE"}]}"#;
    let result = serde_json::from_str::<HistoryResponse>(json);
    assert!(result.is_err());
}
