use chrono::NaiveDate;

use crate::error::TrackerError;
use crate::report::Strategy;

pub const MAX_DAYS: i64 = 3650;
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Validate a date in YYYY-MM-DD format.
pub fn validate_date(input: &str) -> Result<NaiveDate, TrackerError> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| {
        TrackerError::InvalidInput(format!(
            "invalid date '{}'. Expected format: YYYY-MM-DD (e.g., 2026-01-01)",
            trimmed
        ))
    })
}

/// Validate a look-back window: must be 1..=3650 (approx 10 years).
pub fn validate_days(days: i64) -> Result<i64, TrackerError> {
    if !(1..=MAX_DAYS).contains(&days) {
        return Err(TrackerError::InvalidInput(format!(
            "days must be between 1 and {}, got {}",
            MAX_DAYS, days
        )));
    }
    Ok(days)
}

pub fn validate_page_size(page_size: i64) -> Result<i64, TrackerError> {
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(TrackerError::InvalidInput(format!(
            "page_size must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    Ok(page_size)
}

/// Validate a P&L strategy name: case-insensitive `fifo`, `lifo` or `net`.
pub fn validate_strategy(input: &str) -> Result<Strategy, TrackerError> {
    input.parse::<Strategy>().map_err(|_| {
        TrackerError::InvalidInput(format!(
            "unknown strategy '{}'. Valid values: fifo, lifo, net",
            input.trim()
        ))
    })
}
