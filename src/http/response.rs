//! Response rendering.
//!
//! # Responsibilities
//! - Wrap payloads in the versioned envelope with freshness tags
//! - Map orchestrator outcomes to HTTP status codes
//! - Render structured errors
//!
//! # Design Decisions
//! - Stale data is always tagged `exchange_status: "degraded"`
//! - `x-cache-hit` and `x-error-code` headers feed the access log

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::market::ValidationError;
use crate::resilience::{Origin, Outcome, UnavailableReason};

pub const X_CACHE_HIT: &str = "x-cache-hit";
pub const X_ERROR_CODE: &str = "x-error-code";

/// Client-facing errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Exchange temporarily unavailable")]
    Unavailable {
        exchange: String,
        reason: UnavailableReason,
    },

    #[error("Too many requests")]
    RateLimited,
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Unavailable { reason, .. } => reason.code(),
            ApiError::RateLimited => "RATE_LIMITED",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Render with the schema version in force for this request.
    pub fn respond(self, schema_version: &str) -> Response {
        let code = self.code();
        let exchange = match &self {
            ApiError::Unavailable { exchange, .. } => Some(exchange.as_str()),
            _ => None,
        };
        let body = ErrorBody {
            schema_version,
            status: "error",
            error_code: code,
            message: self.to_string(),
            exchange,
        };
        let mut response = (self.status(), Json(body)).into_response();
        response
            .headers_mut()
            .insert(X_ERROR_CODE, HeaderValue::from_static(code));
        response
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::InvalidInput(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    schema_version: &'a str,
    status: &'static str,
    error_code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    exchange: Option<&'a str>,
}

/// How fresh a served value is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Freshness {
    Live { cache_hit: bool },
    Stale { age: Duration },
}

impl Freshness {
    fn cache_hit(&self) -> bool {
        match self {
            Freshness::Live { cache_hit } => *cache_hit,
            Freshness::Stale { .. } => true,
        }
    }
}

/// A value ready to be served.
#[derive(Debug)]
pub struct Delivery<V> {
    pub value: Arc<V>,
    pub freshness: Freshness,
}

impl<V> Delivery<V> {
    /// `Unavailable` becomes a 503 error for `exchange`.
    pub fn from_outcome(outcome: Outcome<V>, exchange: &str) -> Result<Self, ApiError> {
        match outcome {
            Outcome::Fresh { value, origin } => Ok(Self {
                value,
                freshness: Freshness::Live {
                    cache_hit: origin == Origin::Cache,
                },
            }),
            Outcome::StaleFallback { value, age } => Ok(Self {
                value,
                freshness: Freshness::Stale { age },
            }),
            Outcome::Unavailable(reason) => Err(ApiError::Unavailable {
                exchange: exchange.to_string(),
                reason,
            }),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    schema_version: &'a str,
    #[serde(flatten)]
    body: T,
    data_source: &'static str,
    exchange_status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stale_age_seconds: Option<f64>,
}

/// 200 response with the envelope and freshness tags.
pub fn served<T: Serialize>(schema_version: &str, freshness: Freshness, body: T) -> Response {
    let (data_source, exchange_status, stale_age_seconds) = match freshness {
        Freshness::Live { .. } => ("live", "healthy", None),
        Freshness::Stale { age } => (
            "cache",
            "degraded",
            Some((age.as_secs_f64() * 1000.0).round() / 1000.0),
        ),
    };
    let envelope = Envelope {
        schema_version,
        body,
        data_source,
        exchange_status,
        stale_age_seconds,
    };
    let mut response = Json(envelope).into_response();
    response.headers_mut().insert(
        X_CACHE_HIT,
        HeaderValue::from_static(if freshness.cache_hit() { "true" } else { "false" }),
    );
    response
}

/// 200 response for status endpoints: the body plus `schema_version`.
pub fn versioned<T: Serialize>(schema_version: &str, body: T) -> Response {
    #[derive(Serialize)]
    struct Versioned<'a, T> {
        schema_version: &'a str,
        #[serde(flatten)]
        body: T,
    }
    Json(Versioned {
        schema_version,
        body,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[derive(Serialize)]
    struct Price {
        price: f64,
    }

    #[tokio::test]
    async fn test_stale_envelope() {
        let response = served(
            "1.1",
            Freshness::Stale {
                age: Duration::from_millis(42_123),
            },
            Price { price: 10.5 },
        );
        assert_eq!(response.headers()[X_CACHE_HIT], "true");
        let body = json(response).await;
        assert_eq!(body["schema_version"], "1.1");
        assert_eq!(body["price"], 10.5);
        assert_eq!(body["data_source"], "cache");
        assert_eq!(body["exchange_status"], "degraded");
        assert_eq!(body["stale_age_seconds"], 42.123);
    }

    #[tokio::test]
    async fn test_live_envelope_omits_age() {
        let response = served("1.1", Freshness::Live { cache_hit: false }, Price { price: 1.0 });
        assert_eq!(response.headers()[X_CACHE_HIT], "false");
        let body = json(response).await;
        assert_eq!(body["data_source"], "live");
        assert_eq!(body["exchange_status"], "healthy");
        assert!(body.get("stale_age_seconds").is_none());
    }

    #[tokio::test]
    async fn test_unavailable_error() {
        let outcome: Outcome<f64> = Outcome::Unavailable(UnavailableReason::ExchangeUnavailable);
        let err = Delivery::from_outcome(outcome, "NSE").unwrap_err();
        let response = err.respond("1.1");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[X_ERROR_CODE], "EXCHANGE_UNAVAILABLE");

        let body = json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["error_code"], "EXCHANGE_UNAVAILABLE");
        assert_eq!(body["exchange"], "NSE");
        assert_eq!(body["message"], "Exchange temporarily unavailable");
    }

    #[tokio::test]
    async fn test_invalid_input_has_no_exchange() {
        let response = ApiError::from(ValidationError::Symbol("$$".to_string())).respond("1.1");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        assert_eq!(body["error_code"], "INVALID_INPUT");
        assert_eq!(body["message"], "invalid symbol: $$");
        assert!(body.get("exchange").is_none());
    }
}
