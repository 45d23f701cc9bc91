//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (TTLs > 0, thresholds > 0, addresses parse)
//! - Keep nested deadlines ordered: provider retries < provider call < request
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;
use crate::market::Exchange;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.provider_secs == 0 {
        errors.push(ValidationError::new("timeouts.provider_secs", "must be greater than 0"));
    }
    let timeouts = &config.timeouts;
    if timeouts.request_secs > 0 && timeouts.provider_secs >= timeouts.request_secs {
        errors.push(ValidationError::new(
            "timeouts.provider_secs",
            format!(
                "must be less than timeouts.request_secs ({})",
                timeouts.request_secs
            ),
        ));
    }

    let ttls = [
        ("cache.quote_ttl_secs", config.cache.quote_ttl_secs),
        ("cache.intraday_ttl_secs", config.cache.intraday_ttl_secs),
        ("cache.historical_ttl_secs", config.cache.historical_ttl_secs),
        ("cache.search_ttl_secs", config.cache.search_ttl_secs),
        ("cache.fundamentals_ttl_secs", config.cache.fundamentals_ttl_secs),
        ("cache.company_ttl_secs", config.cache.company_ttl_secs),
    ];
    for (field, ttl) in ttls {
        if ttl == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    let breaker = &config.circuit_breaker;
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_threshold",
            "must be greater than 0",
        ));
    }
    for (exchange, o) in &breaker.overrides {
        if exchange.parse::<Exchange>().is_err() {
            errors.push(ValidationError::new(
                format!("circuit_breaker.overrides.{}", exchange),
                "unknown exchange",
            ));
        }
        if o.failure_threshold == Some(0) {
            errors.push(ValidationError::new(
                format!("circuit_breaker.overrides.{}.failure_threshold", exchange),
                "must be greater than 0",
            ));
        }
    }

    if url::Url::parse(&config.provider.base_url).is_err() {
        errors.push(ValidationError::new(
            "provider.base_url",
            format!("'{}' is not a valid URL", config.provider.base_url),
        ));
    }
    if config.provider.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "provider.request_timeout_secs",
            "must be greater than 0",
        ));
    }
    let retry = &config.provider.retry;
    if retry.max_attempts == 0 {
        errors.push(ValidationError::new("provider.retry.max_attempts", "must be at least 1"));
    }
    if retry.max_delay_ms < retry.base_delay_ms {
        errors.push(ValidationError::new(
            "provider.retry.max_delay_ms",
            "must not be less than base_delay_ms",
        ));
    }
    let budget = config.provider.retry_budget();
    if config.timeouts.provider_secs > 0 && budget > config.timeouts.provider_timeout() {
        errors.push(ValidationError::new(
            "provider.request_timeout_secs",
            format!(
                "retry budget of {:.1}s exceeds timeouts.provider_secs ({})",
                budget.as_secs_f64(),
                config.timeouts.provider_secs
            ),
        ));
    }

    if config.rate_limit.enabled && config.rate_limit.requests_per_minute == 0 {
        errors.push(ValidationError::new(
            "rate_limit.requests_per_minute",
            "must be greater than 0 when rate limiting is enabled",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.api.schema_version.trim().is_empty() {
        errors.push(ValidationError::new("api.schema_version", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
