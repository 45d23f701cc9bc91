//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Keep per-exchange counters and latency aggregates in process
//! - Materialize snapshots for the `/metrics` and `/exchanges/status` views
//! - Mirror every update to the `metrics` facade for Prometheus scraping
//!
//! # Metrics
//! - `gateway_requests_total` (counter): upstream decisions by exchange, outcome
//! - `gateway_cache_lookups_total` (counter): cache lookups by exchange, result
//! - `gateway_stale_served_total` (counter): degraded responses by exchange
//! - `gateway_provider_latency_seconds` (histogram): provider call latency
//! - `gateway_breaker_transitions_total` (counter): breaker transitions by target state
//! - `gateway_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_rate_limited_total` (counter): requests refused by the rate limiter
//!
//! # Design Decisions
//! - Every counter is an atomic; snapshots are best-effort across counters
//! - Recording never blocks or fails the caller

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::resilience::circuit_breaker::CircuitState;

/// Result of an upstream decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    Failure,
    BreakerRejected,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::Success => "success",
            RequestOutcome::Failure => "failure",
            RequestOutcome::BreakerRejected => "breaker_rejected",
        }
    }
}

#[derive(Debug, Default)]
struct ExchangeCounters {
    total_requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    breaker_rejections: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    stale_served: AtomicU64,
    latency_count: AtomicU64,
    latency_total_us: AtomicU64,
    latency_max_us: AtomicU64,
    latency_last_us: AtomicU64,
}

impl ExchangeCounters {
    fn observe_latency(&self, latency: Duration) {
        let micros = latency.as_micros().min(u64::MAX as u128) as u64;
        self.latency_count.fetch_add(1, Ordering::Relaxed);
        self.latency_total_us.fetch_add(micros, Ordering::Relaxed);
        self.latency_max_us.fetch_max(micros, Ordering::Relaxed);
        self.latency_last_us.store(micros, Ordering::Relaxed);
    }

    fn view(&self) -> ExchangeMetrics {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        let successes = load(&self.successes);
        let failures = load(&self.failures);
        let cache_hits = load(&self.cache_hits);
        let cache_misses = load(&self.cache_misses);
        let latency_count = load(&self.latency_count);
        let latency_total_us = load(&self.latency_total_us);

        ExchangeMetrics {
            total_requests: load(&self.total_requests),
            successful_requests: successes,
            failed_requests: failures,
            breaker_rejections: load(&self.breaker_rejections),
            cache_hits,
            cache_misses,
            stale_served: load(&self.stale_served),
            failure_rate: round_to(ratio(failures, successes + failures), 4),
            cache_hit_rate: round_to(ratio(cache_hits, cache_hits + cache_misses), 4),
            latency: LatencySummary {
                count: latency_count,
                total_ms: latency_total_us as f64 / 1000.0,
                average_ms: round_to(ratio(latency_total_us, latency_count) / 1000.0, 3),
                max_ms: round_to(load(&self.latency_max_us) as f64 / 1000.0, 3),
                last_ms: round_to(load(&self.latency_last_us) as f64 / 1000.0, 3),
            },
        }
    }
}

/// Latency aggregates in milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    #[serde(skip)]
    pub total_ms: f64,
    pub average_ms: f64,
    pub max_ms: f64,
    pub last_ms: f64,
}

/// Counters for one exchange.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExchangeMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub breaker_rejections: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub stale_served: u64,
    /// Failed share of provider calls.
    pub failure_rate: f64,
    pub cache_hit_rate: f64,
    pub latency: LatencySummary,
}

/// Process-wide view over all exchanges.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: f64,
    pub request_count: u64,
    pub cache_hit_rate: f64,
    pub average_latency_ms: f64,
    pub per_exchange: BTreeMap<String, ExchangeMetrics>,
}

/// In-process metrics registry.
#[derive(Debug)]
pub struct MetricsRegistry {
    exchanges: DashMap<String, Arc<ExchangeCounters>>,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            exchanges: DashMap::new(),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    fn counters(&self, exchange: &str) -> Arc<ExchangeCounters> {
        if let Some(counters) = self.exchanges.get(exchange) {
            return counters.clone();
        }
        self.exchanges
            .entry(exchange.to_string())
            .or_default()
            .clone()
    }

    /// Record the upstream outcome of a request that missed the cache.
    pub fn record_request(&self, exchange: &str, outcome: RequestOutcome, latency: Duration) {
        let counters = self.counters(exchange);
        counters.total_requests.fetch_add(1, Ordering::Relaxed);
        match outcome {
            RequestOutcome::Success => counters.successes.fetch_add(1, Ordering::Relaxed),
            RequestOutcome::Failure => counters.failures.fetch_add(1, Ordering::Relaxed),
            RequestOutcome::BreakerRejected => {
                counters.breaker_rejections.fetch_add(1, Ordering::Relaxed)
            }
        };
        counters.observe_latency(latency);

        ::metrics::counter!(
            "gateway_requests_total",
            "exchange" => exchange.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
        if outcome != RequestOutcome::BreakerRejected {
            ::metrics::histogram!(
                "gateway_provider_latency_seconds",
                "exchange" => exchange.to_string()
            )
            .record(latency.as_secs_f64());
        }
    }

    /// Record a request served from a fresh cache entry.
    pub fn record_cache_hit(&self, exchange: &str) {
        let counters = self.counters(exchange);
        counters.total_requests.fetch_add(1, Ordering::Relaxed);
        counters.cache_hits.fetch_add(1, Ordering::Relaxed);
        record_cache_lookup(exchange, "hit");
    }

    pub fn record_cache_miss(&self, exchange: &str) {
        self.counters(exchange).cache_misses.fetch_add(1, Ordering::Relaxed);
        record_cache_lookup(exchange, "miss");
    }

    /// Record a degraded response served from an expired entry.
    pub fn record_stale_served(&self, exchange: &str) {
        self.counters(exchange).stale_served.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("gateway_stale_served_total", "exchange" => exchange.to_string())
            .increment(1);
    }

    /// Counters for one exchange; zeroes if it was never seen.
    pub fn exchange(&self, exchange: &str) -> ExchangeMetrics {
        self.exchanges
            .get(exchange)
            .map(|counters| counters.view())
            .unwrap_or_default()
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let per_exchange: BTreeMap<String, ExchangeMetrics> = self
            .exchanges
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().view()))
            .collect();

        let request_count: u64 = per_exchange.values().map(|m| m.total_requests).sum();
        let hits: u64 = per_exchange.values().map(|m| m.cache_hits).sum();
        let lookups: u64 = per_exchange
            .values()
            .map(|m| m.cache_hits + m.cache_misses)
            .sum();
        let latency_count: u64 = per_exchange.values().map(|m| m.latency.count).sum();
        let latency_total_ms: f64 = per_exchange.values().map(|m| m.latency.total_ms).sum();

        MetricsSnapshot {
            started_at: self.started_at,
            uptime_seconds: round_to(self.uptime().as_secs_f64(), 3),
            request_count,
            cache_hit_rate: round_to(ratio(hits, lookups), 4),
            average_latency_ms: if latency_count == 0 {
                0.0
            } else {
                round_to(latency_total_ms / latency_count as f64, 3)
            },
            per_exchange,
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn record_cache_lookup(exchange: &str, result: &'static str) {
    ::metrics::counter!(
        "gateway_cache_lookups_total",
        "exchange" => exchange.to_string(),
        "result" => result
    )
    .increment(1);
}

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

/// Record a circuit breaker state change.
pub fn record_breaker_transition(exchange: &str, to: CircuitState) {
    ::metrics::counter!(
        "gateway_breaker_transitions_total",
        "exchange" => exchange.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    let level = match to {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    ::metrics::gauge!("gateway_breaker_state", "exchange" => exchange.to_string()).set(level);
}

/// Record a request refused by the rate limiter.
pub fn record_rate_limited() {
    ::metrics::counter!("gateway_rate_limited_total").increment(1);
}
