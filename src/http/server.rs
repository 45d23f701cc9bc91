//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, access log, rate limit)
//! - Own the shared state: config, provider, orchestrators
//! - Apply hot-reloaded configuration
//! - Serve until the shutdown signal fires

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::cache::TtlCache;
use crate::config::GatewayConfig;
use crate::http::request::{query_value, request_id, X_REQUEST_ID};
use crate::http::response::{X_CACHE_HIT, X_ERROR_CODE};
use crate::http::{handlers, status};
use crate::market::{CandleSeries, Company, Exchange, Fundamentals, Quote, SymbolMatch};
use crate::observability::MetricsRegistry;
use crate::provider::{MarketDataProvider, ProviderError, YahooProvider};
use crate::resilience::{CircuitBreakerRegistry, Orchestrator, ResilienceContext};
use crate::security::{rate_limit_middleware, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<GatewayConfig>>,
    pub provider: Arc<dyn MarketDataProvider>,
    pub resilience: ResilienceContext,
    pub quotes: Arc<Orchestrator<Quote>>,
    pub candles: Arc<Orchestrator<CandleSeries>>,
    pub searches: Arc<Orchestrator<Vec<SymbolMatch>>>,
    pub fundamentals: Arc<Orchestrator<Fundamentals>>,
    pub companies: Arc<Orchestrator<Company>>,
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    pub fn new(config: GatewayConfig, provider: Arc<dyn MarketDataProvider>) -> Self {
        let breakers = CircuitBreakerRegistry::with_overrides(
            config.circuit_breaker.defaults(),
            config.circuit_breaker.resolved_overrides(),
        );
        let resilience =
            ResilienceContext::new(Arc::new(breakers), Arc::new(MetricsRegistry::new()));
        let provider_timeout = config.timeouts.provider_timeout();
        if provider_timeout < Duration::from_secs(config.timeouts.provider_secs) {
            tracing::warn!(
                provider_secs = config.timeouts.provider_secs,
                request_secs = config.timeouts.request_secs,
                effective_ms = provider_timeout.as_millis() as u64,
                "Provider timeout does not fit inside the request timeout, clamping"
            );
        }

        let rate_limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::new(&config.rate_limit)));

        Self {
            quotes: Arc::new(Orchestrator::new(
                new_cache(&config),
                resilience.clone(),
                provider_timeout,
            )),
            candles: Arc::new(Orchestrator::new(
                new_cache(&config),
                resilience.clone(),
                provider_timeout,
            )),
            searches: Arc::new(Orchestrator::new(
                new_cache(&config),
                resilience.clone(),
                provider_timeout,
            )),
            fundamentals: Arc::new(Orchestrator::new(
                new_cache(&config),
                resilience.clone(),
                provider_timeout,
            )),
            companies: Arc::new(Orchestrator::new(
                new_cache(&config),
                resilience.clone(),
                provider_timeout,
            )),
            config: Arc::new(ArcSwap::from_pointee(config)),
            provider,
            resilience,
            rate_limiter,
        }
    }

    /// Schema version currently in force.
    pub fn schema_version(&self) -> String {
        self.config.load().api.schema_version.clone()
    }
}

fn new_cache<V>(config: &GatewayConfig) -> TtlCache<V> {
    match config.cache.max_entries {
        0 => TtlCache::new(),
        max => TtlCache::with_max_entries(max),
    }
}

/// HTTP server for the market data gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server backed by the Yahoo Finance provider.
    pub fn new(config: GatewayConfig) -> Result<Self, ProviderError> {
        let provider = YahooProvider::new(&config.provider)?;
        Ok(Self::with_provider(config, Arc::new(provider)))
    }

    /// Create a server backed by any provider.
    pub fn with_provider(config: GatewayConfig, provider: Arc<dyn MarketDataProvider>) -> Self {
        let state = AppState::new(config, provider);
        let router = Self::build_router(&state);
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: &AppState) -> Router {
        let request_timeout = state.config.load().timeouts.request_timeout();
        let x_request_id = HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .route("/health", get(status::health))
            .route("/readiness", get(status::readiness))
            .route("/metrics", get(status::metrics))
            .route("/exchanges/status", get(status::exchanges_status))
            .route("/market-status", get(status::market_status))
            .route("/quote", get(handlers::quote))
            .route("/price/latest", get(handlers::quote))
            .route("/intraday", get(handlers::intraday))
            .route("/historical", get(handlers::historical))
            .route("/candles", get(handlers::candles))
            .route("/fundamentals", get(handlers::fundamentals))
            .route("/company", get(handlers::company))
            .route("/search", get(handlers::search))
            .route("/symbols", get(handlers::symbols))
            .with_state(state.clone())
            .layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_middleware,
            ))
            .layer(middleware::from_fn_with_state(state.clone(), access_log))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// New configurations received on `config_updates` replace the current
    /// one; the server drains and returns once `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let config = self.state.config.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                tracing::info!(
                    schema_version = %new_config.api.schema_version,
                    quote_ttl_secs = new_config.cache.quote_ttl_secs,
                    "Configuration reloaded"
                );
                config.store(Arc::new(new_config));
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Emit one `request_complete` event per request.
async fn access_log(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let request_id = request_id(request.headers()).to_string();
    let path = request.uri().path().to_string();
    let exchange = query_value(request.uri(), "exchange")
        .and_then(|value| value.parse::<Exchange>().ok());
    let symbol = query_value(request.uri(), "symbol").unwrap_or_default();

    let response = next.run(request).await;

    let latency_ms = (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;
    let circuit_state = exchange
        .map(|exchange| state.resilience.breakers.state(exchange.as_str()).as_str())
        .unwrap_or("NA");
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };
    let cache_hit = header(X_CACHE_HIT);
    let error_code = header(X_ERROR_CODE);
    let status = response.status().as_u16();

    tracing::info!(
        request_id = %request_id,
        path = %path,
        status,
        exchange = exchange.map(|e| e.as_str()).unwrap_or(""),
        symbol = %symbol,
        circuit_state,
        latency_ms,
        cache_hit = %cache_hit,
        error_code = %error_code,
        "request_complete"
    );
    response
}
