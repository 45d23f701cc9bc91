//! Per-client rate limiting middleware.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Client buckets tracked before idle ones are pruned.
const PRUNE_THRESHOLD: usize = 10_000;

/// A bucket idle this long is full again and can be forgotten.
const IDLE_AFTER: Duration = Duration::from_secs(120);

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token buckets keyed by client IP.
///
/// Capacity is `requests_per_minute`; tokens refill at `requests_per_minute / 60`
/// per second.
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    capacity: f64,
    refill_per_sec: f64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = config.requests_per_minute as f64;
        Self {
            buckets: DashMap::new(),
            capacity,
            refill_per_sec: capacity / 60.0,
        }
    }

    /// Take one token for `client`; `false` if the bucket is empty.
    pub fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        if self.buckets.len() > PRUNE_THRESHOLD {
            self.prune(now);
        }

        let mut bucket = self
            .buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, now));
        bucket.try_acquire(self.capacity, self.refill_per_sec, now)
    }

    fn prune(&self, now: Instant) {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_update) < IDLE_AFTER);
        tracing::debug!(
            before,
            after = self.buckets.len(),
            "Pruned idle rate limit buckets"
        );
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Middleware rejecting clients that exceed their bucket.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return next.run(request).await;
    };

    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if limiter.check(&client) {
        next.run(request).await
    } else {
        tracing::warn!(client = %client, "Rate limit exceeded");
        metrics::record_rate_limited();
        ApiError::RateLimited.respond(&state.schema_version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rpm: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled: true,
            requests_per_minute: rpm,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_reject() {
        let limiter = limiter(3);
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));

        // Other clients have their own bucket
        assert!(limiter.check("10.0.0.2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refills_over_time() {
        let limiter = limiter(60);
        for _ in 0..60 {
            assert!(limiter.check("10.0.0.1"));
        }
        assert!(!limiter.check("10.0.0.1"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prunes_idle_clients() {
        let limiter = limiter(10);
        for i in 0..=PRUNE_THRESHOLD {
            limiter.check(&format!("client-{}", i));
        }
        assert_eq!(limiter.tracked_clients(), PRUNE_THRESHOLD + 1);

        tokio::time::advance(IDLE_AFTER + Duration::from_secs(1)).await;
        limiter.check("fresh");
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
