//! Yahoo Finance response models.
//!
//! Only the fields the gateway reads are modelled; everything is optional
//! because Yahoo omits fields freely.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: ChartBody,
}

#[derive(Debug, Deserialize)]
pub struct ChartBody {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
pub struct ChartError {
    pub code: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub meta: ChartMeta,
    #[serde(default)]
    pub timestamp: Option<Vec<i64>>,
    #[serde(default)]
    pub indicators: Option<Indicators>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub currency: Option<String>,
    pub symbol: Option<String>,
    pub regular_market_price: Option<f64>,
    pub regular_market_day_high: Option<f64>,
    pub regular_market_day_low: Option<f64>,
    pub regular_market_volume: Option<f64>,
    pub regular_market_time: Option<i64>,
    pub chart_previous_close: Option<f64>,
    pub previous_close: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<IndicatorQuote>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IndicatorQuote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub quotes: Vec<SearchQuote>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuote {
    pub symbol: Option<String>,
    pub shortname: Option<String>,
    pub longname: Option<String>,
    pub sector: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    pub quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
pub struct QuoteSummaryBody {
    #[serde(default)]
    pub result: Option<Vec<QuoteSummary>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

/// Modules requested from quoteSummary; absent ones stay `None`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummary {
    #[serde(default)]
    pub default_key_statistics: Option<KeyStatistics>,
    #[serde(default)]
    pub financial_data: Option<FinancialData>,
    #[serde(default)]
    pub asset_profile: Option<AssetProfile>,
    #[serde(default)]
    pub price: Option<SummaryPrice>,
}

/// Yahoo wraps numbers as `{"raw": 1.5, "fmt": "1.50"}`.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct RawValue {
    pub raw: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyStatistics {
    #[serde(rename = "trailingPE")]
    pub trailing_pe: Option<RawValue>,
    #[serde(rename = "forwardPE")]
    pub forward_pe: Option<RawValue>,
    pub trailing_eps: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinancialData {
    pub total_revenue: Option<RawValue>,
    pub revenue_growth: Option<RawValue>,
    pub ebitda: Option<RawValue>,
    pub net_income_to_common: Option<RawValue>,
    pub debt_to_equity: Option<RawValue>,
    pub return_on_equity: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetProfile {
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub country: Option<String>,
    pub long_business_summary: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummaryPrice {
    pub long_name: Option<String>,
    pub currency: Option<String>,
    pub market_cap: Option<RawValue>,
}
