//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → security::rate_limit (per-IP token bucket)
//!     → request.rs (query parsing, validation errors)
//!     → handlers.rs / status.rs
//!         → resilience::Orchestrator (cache, breaker, provider)
//!     → response.rs (envelope, freshness tags, error bodies)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;
pub mod status;

pub use request::X_REQUEST_ID;
pub use response::ApiError;
pub use server::{AppState, HttpServer};
