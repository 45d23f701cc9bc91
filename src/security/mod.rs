//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (check per-IP token bucket)
//!     → Pass to handlers
//! ```
//!
//! # Design Decisions
//! - Limits are per client IP; requests without peer info share one bucket
//! - No trust in client input; all query values are validated in handlers

pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, RateLimiter};
