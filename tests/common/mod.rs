//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use market_gateway::config::GatewayConfig;
use market_gateway::market::{
    Candle, CandleSeries, Company, Exchange, Fundamentals, Quote, SymbolMatch,
};
use market_gateway::provider::{MarketDataProvider, ProviderError};
use market_gateway::{HttpServer, Shutdown};

/// A provider whose health can be flipped from the test.
pub struct ScriptedProvider {
    healthy: AtomicBool,
    calls: AtomicU32,
    price: f64,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(price: f64) -> Arc<Self> {
        Arc::new(Self {
            healthy: AtomicBool::new(true),
            calls: AtomicU32::new(0),
            price,
            delay: None,
        })
    }

    pub fn slow(price: f64, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            healthy: AtomicBool::new(true),
            calls: AtomicU32::new(0),
            price,
            delay: Some(delay),
        })
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn attempt(&self) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProviderError::Status(503))
        }
    }
}

#[async_trait]
impl MarketDataProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_quote(&self, _symbol: &str, _exchange: Exchange) -> Result<Quote, ProviderError> {
        self.attempt().await?;
        Ok(Quote {
            price: self.price,
            open: self.price - 1.0,
            high: self.price + 2.0,
            low: self.price - 2.0,
            previous_close: self.price - 0.5,
            volume: 1_000,
            currency: "USD".into(),
            timestamp: Utc::now(),
        })
    }

    async fn fetch_candles(
        &self,
        _symbol: &str,
        _exchange: Exchange,
        _interval: &str,
        _range: &str,
    ) -> Result<CandleSeries, ProviderError> {
        self.attempt().await?;
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 15, 0, 0).unwrap();
        Ok((0..3)
            .map(|i| Candle {
                timestamp: start + chrono::Duration::minutes(5 * i),
                open: self.price,
                high: self.price + 1.0,
                low: self.price - 1.0,
                close: self.price,
                volume: 100,
            })
            .collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>, ProviderError> {
        self.attempt().await?;
        Ok(vec![SymbolMatch {
            symbol: query.to_uppercase(),
            exchange: Exchange::Nasdaq,
            company_name: format!("{} Inc.", query),
            sector: "Technology".into(),
            currency: "USD".into(),
        }])
    }

    async fn fetch_fundamentals(
        &self,
        _symbol: &str,
        exchange: Exchange,
    ) -> Result<Fundamentals, ProviderError> {
        self.attempt().await?;
        Ok(Fundamentals {
            market_cap: self.price * 1_000_000.0,
            pe_ratio: 25.0,
            forward_pe: 22.0,
            eps: self.price / 25.0,
            revenue: 5.0e9,
            revenue_growth: 0.08,
            ebitda: 1.2e9,
            net_income: 8.0e8,
            debt_to_equity: 0.4,
            roe: 0.18,
            sector: "Technology".into(),
            industry: "Software".into(),
            country: "United States".into(),
            currency: match exchange {
                Exchange::Nasdaq => "USD".into(),
                _ => "INR".into(),
            },
        })
    }

    async fn fetch_company(&self, symbol: &str, _exchange: Exchange) -> Result<Company, ProviderError> {
        self.attempt().await?;
        Ok(Company {
            company_name: format!("{} Corporation", symbol),
            sector: "Technology".into(),
            industry: "Software".into(),
            description: String::new(),
            website: String::new(),
            market_cap: self.price * 1_000_000.0,
        })
    }
}

/// Config tuned for tests: no rate limiting, short provider timeout.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.rate_limit.enabled = false;
    config.timeouts.provider_secs = 2;
    config
}

/// Start a gateway on an ephemeral port.
pub async fn spawn_gateway(
    config: GatewayConfig,
    provider: Arc<dyn MarketDataProvider>,
) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_tx, config_updates) = mpsc::unbounded_channel::<GatewayConfig>();
    let server = HttpServer::with_provider(config, provider);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
        drop(config_tx);
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
