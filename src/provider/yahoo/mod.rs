//! Yahoo Finance provider.
//!
//! Quotes and candles come from the v8 chart endpoint, symbol search from the
//! v1 search endpoint, fundamentals and company profiles from v10
//! quoteSummary. Transient failures are retried with backoff.

mod models;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::market::{Candle, CandleSeries, Company, Exchange, Fundamentals, Quote, SymbolMatch};
use crate::provider::{MarketDataProvider, ProviderError};
use crate::resilience::retries::{retry_with_backoff, RetryPolicy};

use models::{
    ChartError, ChartResponse, ChartResult, QuoteSummary, QuoteSummaryResponse, RawValue,
    SearchResponse,
};

const SEARCH_RESULT_LIMIT: &str = "10";
const FUNDAMENTALS_MODULES: &str = "defaultKeyStatistics,financialData,assetProfile,price";
const COMPANY_MODULES: &str = "assetProfile,price";
const UNKNOWN: &str = "Unknown";

pub struct YahooProvider {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl YahooProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::from(&config.retry),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let client = &self.client;
        retry_with_backoff(
            &self.retry,
            || async move {
                let response = client.get(url).query(query).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ProviderError::Status(status.as_u16()));
                }
                response
                    .json::<T>()
                    .await
                    .map_err(|e| ProviderError::Decode(e.to_string()))
            },
            ProviderError::is_retryable,
        )
        .await
    }

    async fn fetch_chart(
        &self,
        provider_symbol: &str,
        interval: &str,
        range: &str,
    ) -> Result<ChartResult, ProviderError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, provider_symbol);
        let response: ChartResponse = self
            .get_json(&url, &[("interval", interval), ("range", range)])
            .await?;

        if let Some(error) = response.chart.error {
            return Err(upstream_error(error));
        }

        response
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| ProviderError::Empty(provider_symbol.to_string()))
    }

    async fn fetch_quote_summary(
        &self,
        provider_symbol: &str,
        modules: &str,
    ) -> Result<QuoteSummary, ProviderError> {
        let url = format!("{}/v10/finance/quoteSummary/{}", self.base_url, provider_symbol);
        let response: QuoteSummaryResponse =
            self.get_json(&url, &[("modules", modules)]).await?;

        if let Some(error) = response.quote_summary.error {
            return Err(upstream_error(error));
        }

        response
            .quote_summary
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| ProviderError::Empty(provider_symbol.to_string()))
    }
}

fn upstream_error(error: ChartError) -> ProviderError {
    ProviderError::InvalidData(format!(
        "{}: {}",
        error.code.unwrap_or_default(),
        error.description.unwrap_or_default()
    ))
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_quote(&self, symbol: &str, exchange: Exchange) -> Result<Quote, ProviderError> {
        let provider_symbol = exchange.provider_symbol(symbol);
        let chart = self.fetch_chart(&provider_symbol, "1m", "1d").await?;
        quote_from_chart(&provider_symbol, chart)
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: &str,
        range: &str,
    ) -> Result<CandleSeries, ProviderError> {
        let provider_symbol = exchange.provider_symbol(symbol);
        let chart = self.fetch_chart(&provider_symbol, interval, range).await?;
        Ok(candles_from_chart(chart))
    }

    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>, ProviderError> {
        let url = format!("{}/v1/finance/search", self.base_url);
        let response: SearchResponse = self
            .get_json(
                &url,
                &[("q", query), ("quotesCount", SEARCH_RESULT_LIMIT), ("newsCount", "0")],
            )
            .await?;
        Ok(matches_from_search(response))
    }

    async fn fetch_fundamentals(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> Result<Fundamentals, ProviderError> {
        let provider_symbol = exchange.provider_symbol(symbol);
        let summary = self
            .fetch_quote_summary(&provider_symbol, FUNDAMENTALS_MODULES)
            .await?;
        Ok(fundamentals_from_summary(summary))
    }

    async fn fetch_company(&self, symbol: &str, exchange: Exchange) -> Result<Company, ProviderError> {
        let provider_symbol = exchange.provider_symbol(symbol);
        let summary = self
            .fetch_quote_summary(&provider_symbol, COMPANY_MODULES)
            .await?;
        Ok(company_from_summary(symbol, summary))
    }
}

fn to_utc(epoch_secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(epoch_secs, 0).single()
}

fn quote_from_chart(provider_symbol: &str, chart: ChartResult) -> Result<Quote, ProviderError> {
    let meta = chart.meta;
    let price = meta
        .regular_market_price
        .ok_or_else(|| ProviderError::Empty(provider_symbol.to_string()))?;
    if !price.is_finite() || price < 0.0 {
        return Err(ProviderError::InvalidData(format!(
            "{} price {}",
            provider_symbol, price
        )));
    }

    let first_open = chart
        .indicators
        .as_ref()
        .and_then(|i| i.quote.first())
        .and_then(|q| q.open.iter().flatten().next().copied());

    let timestamp = chart
        .timestamp
        .as_ref()
        .and_then(|ts| ts.last().copied())
        .or(meta.regular_market_time)
        .and_then(to_utc)
        .unwrap_or_else(Utc::now);

    Ok(Quote {
        price,
        open: first_open.or(meta.chart_previous_close).unwrap_or(price),
        high: meta.regular_market_day_high.unwrap_or(price),
        low: meta.regular_market_day_low.unwrap_or(price),
        previous_close: meta
            .previous_close
            .or(meta.chart_previous_close)
            .unwrap_or(0.0),
        volume: meta.regular_market_volume.unwrap_or(0.0).max(0.0) as u64,
        currency: meta.currency.unwrap_or_else(|| "USD".to_string()),
        timestamp,
    })
}

fn candles_from_chart(chart: ChartResult) -> CandleSeries {
    let timestamps = chart.timestamp.unwrap_or_default();
    let Some(quote) = chart.indicators.and_then(|i| i.quote.into_iter().next()) else {
        return Vec::new();
    };
    let at = |series: &[Option<f64>], idx: usize| series.get(idx).copied().flatten();

    timestamps
        .iter()
        .enumerate()
        .filter_map(|(idx, ts)| {
            let volume = at(&quote.volume, idx)?;
            if volume < 0.0 {
                return None;
            }
            Some(Candle {
                timestamp: to_utc(*ts)?,
                open: at(&quote.open, idx)?,
                high: at(&quote.high, idx)?,
                low: at(&quote.low, idx)?,
                close: at(&quote.close, idx)?,
                volume: volume as u64,
            })
        })
        .collect()
}

fn matches_from_search(response: SearchResponse) -> Vec<SymbolMatch> {
    response
        .quotes
        .into_iter()
        .filter_map(|quote| {
            let provider_symbol = quote.symbol.filter(|s| !s.is_empty())?;
            let (symbol, exchange) = Exchange::from_provider_symbol(&provider_symbol);
            Some(SymbolMatch {
                company_name: quote
                    .shortname
                    .or(quote.longname)
                    .unwrap_or_else(|| symbol.clone()),
                symbol,
                exchange,
                sector: quote.sector.unwrap_or_else(|| "Unknown".to_string()),
                currency: quote.currency.unwrap_or_else(|| "USD".to_string()),
            })
        })
        .collect()
}

fn raw(value: Option<RawValue>) -> f64 {
    value
        .and_then(|v| v.raw)
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn or_unknown(value: Option<String>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn fundamentals_from_summary(summary: QuoteSummary) -> Fundamentals {
    let stats = summary.default_key_statistics.unwrap_or_default();
    let financials = summary.financial_data.unwrap_or_default();
    let profile = summary.asset_profile.unwrap_or_default();
    let price = summary.price.unwrap_or_default();

    Fundamentals {
        market_cap: raw(price.market_cap),
        pe_ratio: raw(stats.trailing_pe),
        forward_pe: raw(stats.forward_pe),
        eps: raw(stats.trailing_eps),
        revenue: raw(financials.total_revenue),
        revenue_growth: raw(financials.revenue_growth),
        ebitda: raw(financials.ebitda),
        net_income: raw(financials.net_income_to_common),
        debt_to_equity: raw(financials.debt_to_equity),
        roe: raw(financials.return_on_equity),
        sector: or_unknown(profile.sector),
        industry: or_unknown(profile.industry),
        country: or_unknown(profile.country),
        currency: price
            .currency
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "USD".to_string()),
    }
}

fn company_from_summary(symbol: &str, summary: QuoteSummary) -> Company {
    let profile = summary.asset_profile.unwrap_or_default();
    let price = summary.price.unwrap_or_default();

    Company {
        company_name: price
            .long_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| symbol.to_string()),
        sector: or_unknown(profile.sector),
        industry: or_unknown(profile.industry),
        description: profile.long_business_summary.unwrap_or_default(),
        website: profile.website.unwrap_or_default(),
        market_cap: raw(price.market_cap),
    }
}
