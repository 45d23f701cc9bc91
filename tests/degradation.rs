//! Degradation behavior of the gateway under provider failure.

use serde_json::Value;
use std::time::Duration;

mod common;

use common::{client, spawn_gateway, test_config, ScriptedProvider};

async fn get(addr: std::net::SocketAddr, path: &str) -> (u16, Option<String>, Value) {
    let res = client()
        .get(format!("http://{}{}", addr, path))
        .send()
        .await
        .expect("Gateway unreachable");
    let status = res.status().as_u16();
    let cache_hit = res
        .headers()
        .get("x-cache-hit")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = res.json().await.unwrap();
    (status, cache_hit, body)
}

#[tokio::test]
async fn test_second_quote_served_from_cache() {
    let provider = ScriptedProvider::new(190.0);
    let (addr, shutdown) = spawn_gateway(test_config(), provider.clone()).await;

    let (status, cache_hit, body) = get(addr, "/quote?symbol=aapl&exchange=nasdaq").await;
    assert_eq!(status, 200);
    assert_eq!(cache_hit.as_deref(), Some("false"));
    assert_eq!(body["symbol"], "AAPL");
    assert_eq!(body["exchange"], "NASDAQ");
    assert_eq!(body["price"], 190.0);
    assert_eq!(body["data_source"], "live");
    assert_eq!(body["exchange_status"], "healthy");
    assert_eq!(body["schema_version"], "1.1");

    let (status, cache_hit, body) = get(addr, "/quote?symbol=AAPL&exchange=NASDAQ").await;
    assert_eq!(status, 200);
    assert_eq!(cache_hit.as_deref(), Some("true"));
    assert_eq!(body["exchange_status"], "healthy");
    assert_eq!(provider.calls(), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_breaker_opens_and_stops_calling_provider() {
    let provider = ScriptedProvider::new(100.0);
    provider.set_healthy(false);
    let mut config = test_config();
    config.circuit_breaker.failure_threshold = 2;
    let (addr, shutdown) = spawn_gateway(config, provider.clone()).await;

    for _ in 0..2 {
        let (status, _, body) = get(addr, "/quote?symbol=MSFT&exchange=NASDAQ").await;
        assert_eq!(status, 503);
        assert_eq!(body["error_code"], "EXCHANGE_UNAVAILABLE");
        assert_eq!(body["exchange"], "NASDAQ");
        assert_eq!(body["status"], "error");
    }
    assert_eq!(provider.calls(), 2);

    let (status, _, _) = get(addr, "/quote?symbol=MSFT&exchange=NASDAQ").await;
    assert_eq!(status, 503);
    assert_eq!(provider.calls(), 2, "Open breaker must not reach the provider");

    let (_, _, exchanges) = get(addr, "/exchanges/status").await;
    assert_eq!(exchanges["NASDAQ"]["state"], "OPEN");
    assert_eq!(exchanges["NSE"]["state"], "CLOSED");
    assert_eq!(exchanges["NASDAQ"]["failure_rate"], 1.0);

    // Other exchanges keep working.
    provider.set_healthy(true);
    let (status, _, _) = get(addr, "/quote?symbol=RELIANCE&exchange=NSE").await;
    assert_eq!(status, 200);

    shutdown.trigger();
}

#[tokio::test]
async fn test_stale_quote_served_when_provider_fails() {
    let provider = ScriptedProvider::new(150.0);
    let mut config = test_config();
    config.cache.quote_ttl_secs = 1;
    let (addr, shutdown) = spawn_gateway(config, provider.clone()).await;

    let (status, _, _) = get(addr, "/quote?symbol=TSLA&exchange=NASDAQ").await;
    assert_eq!(status, 200);

    provider.set_healthy(false);
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let (status, cache_hit, body) = get(addr, "/quote?symbol=TSLA&exchange=NASDAQ").await;
    assert_eq!(status, 200);
    assert_eq!(cache_hit.as_deref(), Some("true"));
    assert_eq!(body["price"], 150.0);
    assert_eq!(body["data_source"], "cache");
    assert_eq!(body["exchange_status"], "degraded");
    assert!(body["stale_age_seconds"].as_f64().unwrap() >= 1.0);
    assert_eq!(provider.calls(), 2);

    shutdown.trigger();
}

#[tokio::test]
async fn test_breaker_recovers_after_cooldown() {
    let provider = ScriptedProvider::new(42.0);
    provider.set_healthy(false);
    let mut config = test_config();
    config.circuit_breaker.failure_threshold = 1;
    config.circuit_breaker.cooldown_ms = 200;
    let (addr, shutdown) = spawn_gateway(config, provider.clone()).await;

    let (status, _, _) = get(addr, "/quote?symbol=INFY&exchange=BSE").await;
    assert_eq!(status, 503);
    let (_, _, exchanges) = get(addr, "/exchanges/status").await;
    assert_eq!(exchanges["BSE"]["state"], "OPEN");

    provider.set_healthy(true);
    tokio::time::sleep(Duration::from_millis(300)).await;

    let (status, cache_hit, body) = get(addr, "/quote?symbol=INFY&exchange=BSE").await;
    assert_eq!(status, 200);
    assert_eq!(cache_hit.as_deref(), Some("false"));
    assert_eq!(body["data_source"], "live");

    let (_, _, exchanges) = get(addr, "/exchanges/status").await;
    assert_eq!(exchanges["BSE"]["state"], "CLOSED");
    assert_eq!(exchanges["BSE"]["consecutive_failures"], 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_invalid_input_rejected_before_provider() {
    let provider = ScriptedProvider::new(1.0);
    let (addr, shutdown) = spawn_gateway(test_config(), provider.clone()).await;

    let (status, _, body) = get(addr, "/quote?symbol=AAPL&exchange=LSE").await;
    assert_eq!(status, 400);
    assert_eq!(body["error_code"], "INVALID_INPUT");

    let (status, _, _) = get(addr, "/quote?symbol=A%20B&exchange=NASDAQ").await;
    assert_eq!(status, 400);

    let (status, _, _) = get(addr, "/intraday?symbol=AAPL&exchange=NASDAQ&interval=7m").await;
    assert_eq!(status, 400);

    let (status, _, body) = get(addr, "/quote").await;
    assert_eq!(status, 400);
    assert_eq!(body["error_code"], "INVALID_INPUT");

    assert_eq!(provider.calls(), 0);
    shutdown.trigger();
}

#[tokio::test]
async fn test_candles_and_search() {
    let provider = ScriptedProvider::new(10.0);
    let (addr, shutdown) = spawn_gateway(test_config(), provider.clone()).await;

    let (status, _, body) = get(addr, "/candles?symbol=AAPL&exchange=NASDAQ").await;
    assert_eq!(status, 200);
    assert_eq!(body["interval"], "5m");
    assert_eq!(body["candles"].as_array().unwrap().len(), 3);

    let (status, _, body) = get(addr, "/search?query=apple").await;
    assert_eq!(status, 200);
    assert_eq!(body["results"][0]["symbol"], "APPLE");

    let (status, _, body) = get(addr, "/symbols").await;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 0);
    assert_eq!(provider.calls(), 2);

    shutdown.trigger();
}

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let provider = ScriptedProvider::new(1.0);
    let mut config = test_config();
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_minute = 2;
    let (addr, shutdown) = spawn_gateway(config, provider).await;

    for _ in 0..2 {
        let (status, _, _) = get(addr, "/health").await;
        assert_eq!(status, 200);
    }

    let (status, _, body) = get(addr, "/health").await;
    assert_eq!(status, 429);
    assert_eq!(body["error_code"], "RATE_LIMITED");

    shutdown.trigger();
}

#[tokio::test]
async fn test_sdk_reads_freshness_and_errors() {
    let provider = ScriptedProvider::new(55.0);
    let mut config = test_config();
    config.circuit_breaker.failure_threshold = 1;
    let (addr, shutdown) = spawn_gateway(config, provider.clone()).await;
    let sdk = market_gateway_sdk::GatewayClient::new(&format!("http://{}", addr));

    let health = sdk.health().await.unwrap();
    assert_eq!(health.status, "ok");

    let quote = sdk.quote("wipro", "nse").await.unwrap();
    assert_eq!(quote.symbol, "WIPRO");
    assert_eq!(quote.exchange, "NSE");
    assert_eq!(quote.price, 55.0);
    assert!(!quote.freshness.is_stale());

    provider.set_healthy(false);
    let err = sdk.quote("TCS", "NSE").await.unwrap_err();
    assert_eq!(err.error_code(), Some("EXCHANGE_UNAVAILABLE"));

    let exchanges = sdk.exchanges_status().await.unwrap();
    assert_eq!(exchanges["NSE"].state, "OPEN");
    assert_eq!(exchanges["NASDAQ"].state, "CLOSED");

    // Cached quote still served while the breaker is open.
    let quote = sdk.quote("WIPRO", "NSE").await.unwrap();
    assert_eq!(quote.price, 55.0);

    provider.set_healthy(true);
    let company = sdk.company("AAPL", "NASDAQ").await.unwrap();
    assert_eq!(company.company_name, "AAPL Corporation");
    assert!(!company.freshness.is_stale());

    shutdown.trigger();
}

#[tokio::test]
async fn test_fundamentals_and_company_cached_per_exchange() {
    let provider = ScriptedProvider::new(80.0);
    let (addr, shutdown) = spawn_gateway(test_config(), provider.clone()).await;

    let (status, cache_hit, body) = get(addr, "/fundamentals?symbol=tcs&exchange=nse").await;
    assert_eq!(status, 200);
    assert_eq!(cache_hit.as_deref(), Some("false"));
    assert_eq!(body["symbol"], "TCS");
    assert_eq!(body["exchange"], "NSE");
    assert_eq!(body["pe_ratio"], 25.0);
    assert_eq!(body["currency"], "INR");
    assert_eq!(body["data_source"], "live");

    let (status, cache_hit, _) = get(addr, "/fundamentals?symbol=TCS&exchange=NSE").await;
    assert_eq!(status, 200);
    assert_eq!(cache_hit.as_deref(), Some("true"));

    // Same symbol on another exchange is a separate entry.
    let (status, cache_hit, _) = get(addr, "/fundamentals?symbol=TCS&exchange=BSE").await;
    assert_eq!(status, 200);
    assert_eq!(cache_hit.as_deref(), Some("false"));

    let (status, _, body) = get(addr, "/company?symbol=msft&exchange=NASDAQ").await;
    assert_eq!(status, 200);
    assert_eq!(body["company_name"], "MSFT Corporation");
    assert_eq!(body["market_cap"], 80_000_000.0);
    let (_, cache_hit, _) = get(addr, "/company?symbol=MSFT&exchange=NASDAQ").await;
    assert_eq!(cache_hit.as_deref(), Some("true"));

    assert_eq!(provider.calls(), 3);
    shutdown.trigger();
}

#[tokio::test]
async fn test_profile_routes_require_exchange() {
    let provider = ScriptedProvider::new(1.0);
    let (addr, shutdown) = spawn_gateway(test_config(), provider.clone()).await;

    for path in ["/fundamentals?symbol=AAPL", "/company?symbol=AAPL"] {
        let (status, _, body) = get(addr, path).await;
        assert_eq!(status, 400, "{}", path);
        assert_eq!(body["error_code"], "INVALID_INPUT");
    }

    assert_eq!(provider.calls(), 0);
    shutdown.trigger();
}

#[tokio::test]
async fn test_stale_company_profile_served_when_provider_fails() {
    let provider = ScriptedProvider::new(20.0);
    let mut config = test_config();
    config.cache.company_ttl_secs = 1;
    config.circuit_breaker.failure_threshold = 1;
    let (addr, shutdown) = spawn_gateway(config, provider.clone()).await;

    let (status, _, _) = get(addr, "/company?symbol=INFY&exchange=NSE").await;
    assert_eq!(status, 200);

    provider.set_healthy(false);
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let (status, cache_hit, body) = get(addr, "/company?symbol=INFY&exchange=NSE").await;
    assert_eq!(status, 200);
    assert_eq!(cache_hit.as_deref(), Some("true"));
    assert_eq!(body["company_name"], "INFY Corporation");
    assert_eq!(body["exchange_status"], "degraded");

    // Nothing cached for fundamentals, and the breaker is now open.
    let (status, _, body) = get(addr, "/fundamentals?symbol=INFY&exchange=NSE").await;
    assert_eq!(status, 503);
    assert_eq!(body["error_code"], "EXCHANGE_UNAVAILABLE");
    assert_eq!(provider.calls(), 2);

    shutdown.trigger();
}
