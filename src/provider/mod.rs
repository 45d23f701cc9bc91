//! Upstream market data providers.
//!
//! # Data Flow
//! ```text
//! Handler closure
//!     → MarketDataProvider::fetch_* (one logical call)
//!         → adapter-internal retries on transport errors
//!     → normalized Quote / CandleSeries / Vec<SymbolMatch> / profile data
//! ```
//!
//! # Design Decisions
//! - Providers know nothing about caching or breakers
//! - Errors are typed so adapters can decide what is worth retrying

pub mod yahoo;

use async_trait::async_trait;

use crate::market::{CandleSeries, Company, Exchange, Fundamentals, Quote, SymbolMatch};

pub use yahoo::YahooProvider;

/// Errors raised by provider adapters.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("no data for {0}")]
    Empty(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl ProviderError {
    /// Transport failures, throttling and upstream 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http(_) => true,
            ProviderError::Status(status) => *status == 429 || *status >= 500,
            ProviderError::Decode(_) | ProviderError::Empty(_) | ProviderError::InvalidData(_) => {
                false
            }
        }
    }
}

/// A source of normalized market data.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Latest quote for a normalized symbol.
    async fn fetch_quote(&self, symbol: &str, exchange: Exchange) -> Result<Quote, ProviderError>;

    /// OHLCV bars for `range` at `interval`. Rows with missing fields are
    /// dropped; further sanitization is left to the caller.
    async fn fetch_candles(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: &str,
        range: &str,
    ) -> Result<CandleSeries, ProviderError>;

    /// Symbols matching a free-text query.
    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>, ProviderError>;

    /// Valuation ratios and financials.
    async fn fetch_fundamentals(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> Result<Fundamentals, ProviderError>;

    async fn fetch_company(&self, symbol: &str, exchange: Exchange)
        -> Result<Company, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Status(503).is_retryable());
        assert!(ProviderError::Status(429).is_retryable());
        assert!(!ProviderError::Status(404).is_retryable());
        assert!(!ProviderError::Empty("AAPL".to_string()).is_retryable());
        assert!(!ProviderError::InvalidData("negative price".to_string()).is_retryable());
    }
}
