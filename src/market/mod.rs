//! Market domain: exchanges, symbols, sessions and normalized payloads.
//!
//! # Design Decisions
//! - Inputs are normalized once at the HTTP boundary; everything past it
//!   works with validated values
//! - Payloads are immutable after normalization and shared via `Arc`

pub mod candles;
pub mod exchange;
pub mod models;
pub mod session;
pub mod symbol;

pub use candles::sanitize_candles;
pub use exchange::Exchange;
pub use models::{Candle, CandleSeries, Company, Fundamentals, Quote, SymbolMatch};
pub use session::{session_at, MarketStatus, Session};

/// Rejected client input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid symbol: {0}")]
    Symbol(String),
    #[error("invalid exchange: {0} (expected NSE, BSE or NASDAQ)")]
    Exchange(String),
    #[error("invalid interval: {0}")]
    Interval(String),
    #[error("invalid period: {0}")]
    Period(String),
    #[error("query must be 1-64 characters")]
    Query,
    #[error("missing parameter: {0}")]
    Missing(&'static str),
}
