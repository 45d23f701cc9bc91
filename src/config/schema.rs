//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::resilience::circuit_breaker::BreakerSettings;

/// Root configuration for the market data gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Cache TTLs and capacity.
    pub cache: CacheConfig,

    /// Per-exchange circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Upstream market data provider.
    pub provider: ProviderConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Response envelope settings.
    pub api: ApiConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for an inbound request, in seconds.
    pub request_secs: u64,

    /// Deadline for one provider call made by the orchestrator, in seconds.
    pub provider_secs: u64,
}

/// Share of the request timeout granted to a provider call when the
/// configured provider deadline would outlive the request.
const PROVIDER_SHARE_OF_REQUEST: f64 = 0.8;

impl TimeoutConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    /// Deadline for an orchestrated provider call.
    ///
    /// Always shorter than the request timeout, so an expiring provider call
    /// is seen by the orchestrator rather than cut off by the HTTP layer.
    pub fn provider_timeout(&self) -> Duration {
        let request = self.request_timeout();
        let provider = Duration::from_secs(self.provider_secs);
        if provider < request {
            provider
        } else {
            request.mul_f64(PROVIDER_SHARE_OF_REQUEST)
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            provider_secs: 20,
        }
    }
}

/// Cache TTLs per payload kind.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub quote_ttl_secs: u64,
    pub intraday_ttl_secs: u64,
    pub historical_ttl_secs: u64,
    pub search_ttl_secs: u64,
    pub fundamentals_ttl_secs: u64,
    pub company_ttl_secs: u64,

    /// Capacity per payload cache; least recently used entries are evicted.
    /// Zero disables the bound.
    pub max_entries: usize,
}

impl CacheConfig {
    pub fn quote_ttl(&self) -> Duration {
        Duration::from_secs(self.quote_ttl_secs)
    }

    pub fn intraday_ttl(&self) -> Duration {
        Duration::from_secs(self.intraday_ttl_secs)
    }

    pub fn historical_ttl(&self) -> Duration {
        Duration::from_secs(self.historical_ttl_secs)
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }

    pub fn fundamentals_ttl(&self) -> Duration {
        Duration::from_secs(self.fundamentals_ttl_secs)
    }

    pub fn company_ttl(&self) -> Duration {
        Duration::from_secs(self.company_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            quote_ttl_secs: 30,
            intraday_ttl_secs: 60,
            historical_ttl_secs: 300,
            search_ttl_secs: 3600,
            fundamentals_ttl_secs: 900,
            company_ttl_secs: 3600,
            max_entries: 10_000,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,

    /// Time the breaker stays open before admitting a probe, in milliseconds.
    pub cooldown_ms: u64,

    /// Per-exchange overrides keyed by exchange code.
    pub overrides: HashMap<String, BreakerOverride>,
}

impl CircuitBreakerConfig {
    pub fn defaults(&self) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: self.failure_threshold,
            cooldown: Duration::from_millis(self.cooldown_ms),
        }
    }

    /// Resolved settings for every overridden exchange.
    pub fn resolved_overrides(&self) -> HashMap<String, BreakerSettings> {
        let defaults = self.defaults();
        self.overrides
            .iter()
            .map(|(exchange, o)| {
                let settings = BreakerSettings {
                    failure_threshold: o.failure_threshold.unwrap_or(defaults.failure_threshold),
                    cooldown: o
                        .cooldown_ms
                        .map(Duration::from_millis)
                        .unwrap_or(defaults.cooldown),
                };
                (exchange.to_uppercase(), settings)
            })
            .collect()
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 60_000,
            overrides: HashMap::new(),
        }
    }
}

/// Override of breaker settings for a single exchange.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BreakerOverride {
    pub failure_threshold: Option<u32>,
    pub cooldown_ms: Option<u64>,
}

/// Upstream provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the Yahoo Finance API.
    pub base_url: String,

    /// User-Agent sent upstream.
    pub user_agent: String,

    /// HTTP client timeout per attempt, in seconds.
    pub request_timeout_secs: u64,

    /// Retry policy for transient upstream errors.
    pub retry: RetryConfig,
}

impl ProviderConfig {
    /// Worst-case time for one logical call: every attempt times out and
    /// every backoff hits its cap plus jitter.
    pub fn retry_budget(&self) -> Duration {
        let attempts = self.retry.max_attempts.max(1);
        let per_attempt = Duration::from_secs(self.request_timeout_secs);
        let max_delay = Duration::from_millis(self.retry.max_delay_ms).mul_f64(1.1);
        per_attempt * attempts + max_delay * (attempts - 1)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            user_agent: "Mozilla/5.0 (compatible; market-gateway/0.1)".to_string(),
            request_timeout_secs: 5,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub max_attempts: u32,

    /// Base delay between attempts (exponential).
    pub base_delay_ms: u64,

    /// Upper bound on a single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 300,
            max_delay_ms: 2_000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests allowed per client IP per minute (also the burst size).
    pub requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 120,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Prometheus exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Response envelope settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Value of `schema_version` in every JSON body.
    pub schema_version: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            schema_version: "1.1".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8000");
        assert_eq!(config.cache.quote_ttl(), Duration::from_secs(30));
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.provider.retry.max_attempts, 3);
        assert_eq!(config.api.schema_version, "1.1");
    }

    #[test]
    fn test_partial_sections() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [cache]
            quote_ttl_secs = 5

            [observability]
            log_format = "json"

            [circuit_breaker.overrides.nse]
            cooldown_ms = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.cache.quote_ttl_secs, 5);
        assert_eq!(config.cache.intraday_ttl_secs, 60);
        assert_eq!(config.observability.log_format, LogFormat::Json);

        let overrides = config.circuit_breaker.resolved_overrides();
        let nse = overrides["NSE"];
        assert_eq!(nse.cooldown, Duration::from_secs(1));
        assert_eq!(nse.failure_threshold, 5);
    }

    #[test]
    fn test_provider_timeout_stays_inside_request() {
        let defaults = TimeoutConfig::default();
        assert_eq!(defaults.provider_timeout(), Duration::from_secs(20));

        let inverted = TimeoutConfig {
            request_secs: 1,
            provider_secs: 5,
        };
        assert_eq!(inverted.provider_timeout(), Duration::from_millis(800));
    }

    #[test]
    fn test_default_retry_budget_fits_provider_timeout() {
        let config = GatewayConfig::default();
        let budget = config.provider.retry_budget();
        assert!(budget > Duration::from_millis(19_399) && budget < Duration::from_millis(19_401));
        assert!(budget <= config.timeouts.provider_timeout());
    }
}

