//! Request parsing.
//!
//! # Responsibilities
//! - Deserialize query parameters for each route
//! - Turn extractor rejections into `INVALID_INPUT`
//! - Read the request ID and query values for access logging

use axum::extract::rejection::QueryRejection;
use axum::extract::Query;
use axum::http::{HeaderMap, Uri};
use serde::Deserialize;

use crate::http::response::ApiError;

pub const X_REQUEST_ID: &str = "x-request-id";

fn default_exchange() -> String {
    "NASDAQ".to_string()
}

fn default_intraday_interval() -> String {
    "5m".to_string()
}

fn default_historical_period() -> String {
    "6mo".to_string()
}

fn default_daily_interval() -> String {
    "1d".to_string()
}

fn default_symbol_limit() -> usize {
    25
}

#[derive(Debug, Deserialize)]
pub struct QuoteParams {
    pub symbol: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
}

#[derive(Debug, Deserialize)]
pub struct IntradayParams {
    pub symbol: String,
    pub exchange: String,
    #[serde(default = "default_intraday_interval")]
    pub interval: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoricalParams {
    pub symbol: String,
    pub exchange: String,
    #[serde(default = "default_historical_period")]
    pub period: String,
    #[serde(default = "default_daily_interval")]
    pub interval: String,
}

/// `/candles` shares the historical path with friendlier defaults.
#[derive(Debug, Deserialize)]
pub struct CandlesParams {
    pub symbol: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default = "default_intraday_interval")]
    pub interval: String,
    #[serde(default = "default_daily_interval")]
    pub period: String,
}

impl From<CandlesParams> for HistoricalParams {
    fn from(params: CandlesParams) -> Self {
        Self {
            symbol: params.symbol,
            exchange: params.exchange,
            period: params.period,
            interval: params.interval,
        }
    }
}

/// `/fundamentals` and `/company` require an explicit exchange.
#[derive(Debug, Deserialize)]
pub struct ProfileParams {
    pub symbol: String,
    pub exchange: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct SymbolsParams {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_symbol_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct MarketStatusParams {
    pub exchange: String,
}

/// Unwrap a query extractor, mapping rejections to `INVALID_INPUT`.
pub fn parse<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::InvalidInput(rejection.body_text()))
}

/// Request ID set by the request-id layer, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// First value of a query parameter, percent-decoded.
pub fn query_value(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_value() {
        let uri: Uri = "/quote?symbol=brk%2Db&exchange=nasdaq".parse().unwrap();
        assert_eq!(query_value(&uri, "symbol").as_deref(), Some("brk-b"));
        assert_eq!(query_value(&uri, "exchange").as_deref(), Some("nasdaq"));
        assert_eq!(query_value(&uri, "interval"), None);

        let bare: Uri = "/health".parse().unwrap();
        assert_eq!(query_value(&bare, "symbol"), None);
    }

    #[test]
    fn test_request_id_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers), "unknown");
        headers.insert(X_REQUEST_ID, "abc-123".parse().unwrap());
        assert_eq!(request_id(&headers), "abc-123");
    }
}
