//! Response caching subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator lookup
//!     → ttl.rs get (fresh hit: serve, done)
//!     → stale or missing: orchestrator decides via circuit breaker
//!     → successful provider call: ttl.rs put (overwrite, reset age)
//! ```

pub mod ttl;

pub use ttl::{CacheStats, Cached, TtlCache};
