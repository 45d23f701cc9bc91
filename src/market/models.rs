//! Normalized payloads produced by providers and cached by the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::market::Exchange;

/// Latest trade snapshot for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub previous_close: f64,
    pub volume: u64,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
}

/// One OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

pub type CandleSeries = Vec<Candle>;

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMatch {
    pub symbol: String,
    pub exchange: Exchange,
    pub company_name: String,
    pub sector: String,
    pub currency: String,
}

/// Valuation and financial ratios. Missing upstream figures are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub market_cap: f64,
    pub pe_ratio: f64,
    pub forward_pe: f64,
    pub eps: f64,
    pub revenue: f64,
    pub revenue_growth: f64,
    pub ebitda: f64,
    pub net_income: f64,
    pub debt_to_equity: f64,
    pub roe: f64,
    pub sector: String,
    pub industry: String,
    pub country: String,
    pub currency: String,
}

/// Company profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub company_name: String,
    pub sector: String,
    pub industry: String,
    pub description: String,
    pub website: String,
    pub market_cap: f64,
}
