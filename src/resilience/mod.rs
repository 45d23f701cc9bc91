//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Handler request:
//!     → orchestrator.rs (cache lookup, breaker decision, fallback)
//!     → circuit_breaker.rs (per-exchange failure tracking)
//!     → timeouts.rs (deadline on the provider call)
//!
//! Inside provider adapters:
//!     → retries.rs (re-run transient failures)
//!     → backoff.rs (spacing between attempts)
//! ```
//!
//! # Design Decisions
//! - Every provider call has a deadline
//! - Exchanges fail independently; one breaker per exchange
//! - A degraded answer from cache beats an error

pub mod backoff;
pub mod circuit_breaker;
pub mod orchestrator;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerSettings, CircuitBreakerRegistry, CircuitState};
pub use orchestrator::{Orchestrator, Origin, Outcome, ResilienceContext, UnavailableReason};
