//! Resilient fetch: cache, circuit breaker and provider combined.
//!
//! # Decision Order
//! ```text
//! resolve(exchange, key, fetch):
//!     → fresh cache entry?            → Fresh { origin: Cache }
//!     → breaker.allow(exchange)
//!         Reject                      → fallback
//!         Proceed / ProceedAsProbe    → fetch() under provider timeout
//!             Ok                      → cache.put, record_success(decision) → Fresh { origin: Provider }
//!             Err / timeout           → record_failure(decision) → fallback
//!
//! fallback:
//!     → fresh entry (written concurrently)  → Fresh { origin: Cache }
//!     → stale entry                         → StaleFallback { age }
//!     → nothing                             → Unavailable
//! ```
//!
//! # Design Decisions
//! - The orchestrator never retries; provider adapters own retry policy
//! - A probe dropped mid-flight releases its slot and leaves the breaker
//!   half-open; cancellation is not an upstream failure
//! - Every request that reaches the breaker updates the per-exchange metrics
//!   exactly once

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::cache::TtlCache;
use crate::observability::metrics::{MetricsRegistry, RequestOutcome};
use crate::resilience::circuit_breaker::{CircuitBreakerRegistry, Decision};
use crate::resilience::timeouts::call_with_timeout;

/// Where a fresh value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Provider,
}

/// Why no value could be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Upstream failed or is blocked and nothing is cached.
    ExchangeUnavailable,
}

impl UnavailableReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnavailableReason::ExchangeUnavailable => "EXCHANGE_UNAVAILABLE",
        }
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Result of one resolve call.
#[derive(Debug)]
pub enum Outcome<V> {
    Fresh { value: Arc<V>, origin: Origin },
    StaleFallback { value: Arc<V>, age: Duration },
    Unavailable(UnavailableReason),
}

impl<V> Outcome<V> {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Outcome::Fresh { .. })
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Outcome::StaleFallback { .. })
    }

    pub fn value(&self) -> Option<&Arc<V>> {
        match self {
            Outcome::Fresh { value, .. } | Outcome::StaleFallback { value, .. } => Some(value),
            Outcome::Unavailable(_) => None,
        }
    }
}

/// State shared by every orchestrator in the process.
#[derive(Clone, Default)]
pub struct ResilienceContext {
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub metrics: Arc<MetricsRegistry>,
}

impl ResilienceContext {
    pub fn new(breakers: Arc<CircuitBreakerRegistry>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { breakers, metrics }
    }
}

/// Releases a half-open probe slot unless the call reached a verdict.
struct ProbeGuard<'a> {
    breakers: &'a CircuitBreakerRegistry,
    exchange: &'a str,
    armed: bool,
}

impl<'a> ProbeGuard<'a> {
    fn new(breakers: &'a CircuitBreakerRegistry, exchange: &'a str, decision: Decision) -> Self {
        Self {
            breakers,
            exchange,
            armed: decision == Decision::ProceedAsProbe,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(exchange = %self.exchange, "Probe abandoned, releasing slot");
            self.breakers.release_probe(self.exchange);
        }
    }
}

/// Resolves values of one payload type.
pub struct Orchestrator<V> {
    cache: TtlCache<V>,
    context: ResilienceContext,
    provider_timeout: Duration,
}

impl<V> Orchestrator<V> {
    pub fn new(cache: TtlCache<V>, context: ResilienceContext, provider_timeout: Duration) -> Self {
        Self {
            cache,
            context,
            provider_timeout,
        }
    }

    pub fn cache(&self) -> &TtlCache<V> {
        &self.cache
    }

    pub fn context(&self) -> &ResilienceContext {
        &self.context
    }

    /// Produce the best available value for `key`.
    ///
    /// `ttl` applies to a value obtained from `fetch`. Errors from `fetch` are
    /// only logged; callers see them as a fallback or `Unavailable`.
    pub async fn resolve<F, Fut, E>(
        &self,
        exchange: &str,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Outcome<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: fmt::Display,
    {
        let metrics = &self.context.metrics;
        let breakers = &self.context.breakers;

        if let Some(hit) = self.cache.get(key) {
            if hit.fresh {
                metrics.record_cache_hit(exchange);
                return Outcome::Fresh {
                    value: hit.value,
                    origin: Origin::Cache,
                };
            }
        }
        metrics.record_cache_miss(exchange);

        let started = Instant::now();
        let decision = breakers.allow(exchange);
        if decision == Decision::Reject {
            tracing::debug!(exchange = %exchange, key = %key, "Circuit open, skipping provider");
            metrics.record_request(exchange, RequestOutcome::BreakerRejected, started.elapsed());
            return self.fallback(exchange, key);
        }

        let mut guard = ProbeGuard::new(breakers, exchange, decision);
        let result = call_with_timeout(self.provider_timeout, fetch()).await;
        let latency = started.elapsed();

        match result {
            Ok(value) => {
                let value = self.cache.put(key, value, ttl);
                breakers.record_success(exchange, decision);
                guard.disarm();
                metrics.record_request(exchange, RequestOutcome::Success, latency);
                Outcome::Fresh {
                    value,
                    origin: Origin::Provider,
                }
            }
            Err(e) => {
                let probe = decision == Decision::ProceedAsProbe;
                let latency_ms = latency.as_millis() as u64;
                tracing::warn!(
                    exchange = %exchange,
                    key = %key,
                    probe,
                    timed_out = e.is_timeout(),
                    latency_ms,
                    error = %e,
                    "Provider call failed"
                );
                breakers.record_failure(exchange, decision);
                guard.disarm();
                metrics.record_request(exchange, RequestOutcome::Failure, latency);
                self.fallback(exchange, key)
            }
        }
    }

    fn fallback(&self, exchange: &str, key: &str) -> Outcome<V> {
        match self.cache.get(key) {
            Some(hit) if hit.fresh => Outcome::Fresh {
                value: hit.value,
                origin: Origin::Cache,
            },
            Some(hit) => {
                tracing::info!(
                    exchange = %exchange,
                    key = %key,
                    age_secs = hit.age.as_secs_f64(),
                    "Serving stale value"
                );
                self.context.metrics.record_stale_served(exchange);
                Outcome::StaleFallback {
                    value: hit.value,
                    age: hit.age,
                }
            }
            None => Outcome::Unavailable(UnavailableReason::ExchangeUnavailable),
        }
    }
}
