//! Client for the market data gateway HTTP API.

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with its structured error body.
    #[error("gateway returned {status} {error_code}: {message}")]
    Api {
        status: u16,
        error_code: String,
        message: String,
    },

    #[error("gateway returned {status}: {body}")]
    Unexpected { status: u16, body: String },
}

impl SdkError {
    /// Error code from the gateway body, if it sent one.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            SdkError::Api { error_code, .. } => Some(error_code),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error_code: String,
    message: String,
}

/// Freshness tags present on every market data response.
#[derive(Debug, Clone, Deserialize)]
pub struct Freshness {
    pub data_source: String,
    pub exchange_status: String,
    #[serde(default)]
    pub stale_age_seconds: Option<f64>,
}

impl Freshness {
    pub fn is_stale(&self) -> bool {
        self.exchange_status == "degraded"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteResponse {
    pub schema_version: String,
    pub exchange: String,
    pub symbol: String,
    pub price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub previous_close: f64,
    pub volume: u64,
    pub currency: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub freshness: Freshness,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candle {
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandlesResponse {
    pub schema_version: String,
    pub exchange: String,
    pub symbol: String,
    pub interval: String,
    #[serde(default)]
    pub period: Option<String>,
    pub candles: Vec<Candle>,
    #[serde(flatten)]
    pub freshness: Freshness,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundamentalsResponse {
    pub schema_version: String,
    pub exchange: String,
    pub symbol: String,
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
    #[serde(flatten)]
    pub freshness: Freshness,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanyResponse {
    pub schema_version: String,
    pub exchange: String,
    pub symbol: String,
    pub company_name: String,
    pub sector: String,
    pub industry: String,
    pub description: String,
    pub website: String,
    pub market_cap: f64,
    #[serde(flatten)]
    pub freshness: Freshness,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub schema_version: String,
    pub status: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeHealth {
    pub state: String,
    pub failure_rate: f64,
    pub average_latency_ms: f64,
    pub consecutive_failures: u32,
}

pub struct GatewayClient {
    client: Client,
    gateway_url: String,
}

impl GatewayClient {
    pub fn new(gateway_url: &str) -> Self {
        Self {
            client: Client::new(),
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn health(&self) -> Result<HealthResponse, SdkError> {
        self.get("/health", &[]).await
    }

    pub async fn quote(&self, symbol: &str, exchange: &str) -> Result<QuoteResponse, SdkError> {
        self.get("/quote", &[("symbol", symbol), ("exchange", exchange)])
            .await
    }

    pub async fn candles(
        &self,
        symbol: &str,
        exchange: &str,
        interval: &str,
        period: &str,
    ) -> Result<CandlesResponse, SdkError> {
        self.get(
            "/candles",
            &[
                ("symbol", symbol),
                ("exchange", exchange),
                ("interval", interval),
                ("period", period),
            ],
        )
        .await
    }

    pub async fn fundamentals(
        &self,
        symbol: &str,
        exchange: &str,
    ) -> Result<FundamentalsResponse, SdkError> {
        self.get("/fundamentals", &[("symbol", symbol), ("exchange", exchange)])
            .await
    }

    pub async fn company(&self, symbol: &str, exchange: &str) -> Result<CompanyResponse, SdkError> {
        self.get("/company", &[("symbol", symbol), ("exchange", exchange)])
            .await
    }

    /// Breaker state per exchange, keyed by exchange code.
    pub async fn exchanges_status(&self) -> Result<BTreeMap<String, ExchangeHealth>, SdkError> {
        let mut body: BTreeMap<String, serde_json::Value> =
            self.get("/exchanges/status", &[]).await?;
        body.remove("schema_version");
        body.into_iter()
            .map(|(name, value)| {
                serde_json::from_value(value)
                    .map(|health| (name.clone(), health))
                    .map_err(|e| SdkError::Unexpected {
                        status: 200,
                        body: format!("{}: {}", name, e),
                    })
            })
            .collect()
    }

    /// Raw metrics snapshot.
    pub async fn metrics(&self) -> Result<serde_json::Value, SdkError> {
        self.get("/metrics", &[]).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SdkError> {
        let resp = self
            .client
            .get(format!("{}{}", self.gateway_url, path))
            .query(query)
            .send()
            .await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, SdkError> {
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        return Err(match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => SdkError::Api {
                status: status.as_u16(),
                error_code: body.error_code,
                message: body.message,
            },
            Err(_) => SdkError::Unexpected {
                status: status.as_u16(),
                body: text,
            },
        });
    }

    serde_json::from_str(&text).map_err(|e| SdkError::Unexpected {
        status: status.as_u16(),
        body: format!("{}: {}", e, text),
    })
}
