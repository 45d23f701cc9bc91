//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator, breakers, rate limiter produce:
//!     → metrics.rs (per-exchange counters + Prometheus facade)
//!     → logging.rs (structured log events)
//!
//! Consumers:
//!     → GET /metrics, GET /exchanges/status (JSON snapshots)
//!     → Prometheus scrape on the exporter address
//!     → stdout (pretty or JSON)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every access log line
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use metrics::{MetricsRegistry, MetricsSnapshot, RequestOutcome};
