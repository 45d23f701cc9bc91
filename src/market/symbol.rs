//! Input normalization for symbols, intervals, periods and search queries.

use crate::market::ValidationError;

pub const INTERVALS: &[&str] = &[
    "1m", "2m", "5m", "15m", "30m", "60m", "90m", "1h", "1d", "5d", "1wk", "1mo", "3mo",
];

pub const PERIODS: &[&str] = &[
    "1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max",
];

const MAX_SYMBOL_LEN: usize = 16;
const MAX_QUERY_LEN: usize = 64;

/// Trim and upper-case a symbol; 1–16 of `A-Z 0-9 . _ -`.
pub fn normalize_symbol(symbol: &str) -> Result<String, ValidationError> {
    let cleaned = symbol.trim().to_uppercase();
    let valid = !cleaned.is_empty()
        && cleaned.len() <= MAX_SYMBOL_LEN
        && cleaned
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(cleaned)
    } else {
        Err(ValidationError::Symbol(symbol.to_string()))
    }
}

pub fn validate_interval(interval: &str) -> Result<&str, ValidationError> {
    let interval = interval.trim();
    if INTERVALS.contains(&interval) {
        Ok(interval)
    } else {
        Err(ValidationError::Interval(interval.to_string()))
    }
}

pub fn validate_period(period: &str) -> Result<&str, ValidationError> {
    let period = period.trim();
    if PERIODS.contains(&period) {
        Ok(period)
    } else {
        Err(ValidationError::Period(period.to_string()))
    }
}

pub fn normalize_query(query: &str) -> Result<String, ValidationError> {
    let trimmed = query.trim();
    let len = trimmed.chars().count();
    if (1..=MAX_QUERY_LEN).contains(&len) {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::Query)
    }
}
