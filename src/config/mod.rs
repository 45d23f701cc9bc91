//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via ArcSwap to the HTTP layer
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of Arc<GatewayConfig>
//!     → handlers read new TTLs and schema version on the next request
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Listener, provider, breaker and rate limit settings are read once at startup

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ApiConfig, BreakerOverride, CacheConfig, CircuitBreakerConfig, GatewayConfig, ListenerConfig,
    LogFormat, ObservabilityConfig, ProviderConfig, RateLimitConfig, RetryConfig, TimeoutConfig,
};
pub use watcher::ConfigWatcher;
