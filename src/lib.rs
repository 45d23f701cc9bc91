//! Market data gateway library.

pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod market;
pub mod observability;
pub mod provider;
pub mod resilience;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
