//! Operational endpoints: liveness, readiness, metrics and exchange health.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::cache::CacheStats;
use crate::http::request::{parse, MarketStatusParams};
use crate::http::response::{versioned, ApiError};
use crate::http::server::AppState;
use crate::market::{session_at, Exchange};
use crate::resilience::CircuitState;

#[derive(Serialize)]
struct Health {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct Readiness {
    status: &'static str,
    cache: CacheStats,
}

#[derive(Serialize)]
struct ExchangeHealth {
    state: CircuitState,
    failure_rate: f64,
    average_latency_ms: f64,
    consecutive_failures: u32,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Response {
    versioned(
        &state.schema_version(),
        Health {
            status: "ok",
            timestamp: Utc::now(),
        },
    )
}

/// GET /readiness
pub async fn readiness(State(state): State<AppState>) -> Response {
    let cache = state.quotes.cache().stats()
        + state.candles.cache().stats()
        + state.searches.cache().stats()
        + state.fundamentals.cache().stats()
        + state.companies.cache().stats();
    versioned(
        &state.schema_version(),
        Readiness {
            status: "ready",
            cache,
        },
    )
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> Response {
    versioned(&state.schema_version(), state.resilience.metrics.snapshot())
}

/// GET /exchanges/status
pub async fn exchanges_status(State(state): State<AppState>) -> Response {
    let breakers = &state.resilience.breakers;
    let metrics = &state.resilience.metrics;

    let exchanges: BTreeMap<&'static str, ExchangeHealth> = Exchange::ALL
        .iter()
        .map(|exchange| {
            let name = exchange.as_str();
            let breaker = breakers.snapshot_for(name);
            let counters = metrics.exchange(name);
            (
                name,
                ExchangeHealth {
                    state: breaker.state,
                    failure_rate: counters.failure_rate,
                    average_latency_ms: counters.latency.average_ms,
                    consecutive_failures: breaker.consecutive_failures,
                },
            )
        })
        .collect();

    versioned(&state.schema_version(), exchanges)
}

/// GET /market-status
pub async fn market_status(
    State(state): State<AppState>,
    query: Result<Query<MarketStatusParams>, QueryRejection>,
) -> Response {
    let schema_version = state.schema_version();
    let exchange = parse(query).and_then(|params| {
        params
            .exchange
            .parse::<Exchange>()
            .map_err(ApiError::from)
    });
    match exchange {
        Ok(exchange) => versioned(&schema_version, session_at(exchange, Utc::now())),
        Err(err) => err.respond(&schema_version),
    }
}
