//! Market Data Gateway
//!
//! Serves quotes, candles and symbol search for NSE, BSE and NASDAQ on top of
//! an unreliable upstream provider.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                 MARKET GATEWAY                   │
//!                        │                                                  │
//!   Client Request       │  ┌────────────┐   ┌──────────┐   ┌────────────┐  │
//!   ─────────────────────┼─▶│ rate limit │──▶│ handlers │──▶│orchestrator│  │
//!                        │  └────────────┘   └──────────┘   └─────┬──────┘  │
//!                        │                                       │         │
//!                        │              ┌────────────┬───────────┼──────┐  │
//!                        │              ▼            ▼           ▼      │  │
//!                        │        ┌──────────┐ ┌──────────┐ ┌─────────┐ │  │
//!                        │        │ TTL cache│ │ breakers │ │ metrics │ │  │
//!                        │        └──────────┘ └──────────┘ └─────────┘ │  │
//!                        │                                              │  │
//!                        │                       ┌──────────────────────┘  │
//!                        │                       ▼                         │
//!                        │                 ┌──────────┐                    │     Yahoo
//!                        │                 │ provider │────────────────────┼───▶ Finance
//!                        │                 └──────────┘                    │
//!                        └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use market_gateway::config::{load_config, ConfigWatcher, GatewayConfig};
use market_gateway::observability::{logging, metrics};
use market_gateway::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "market-gateway", version, about = "Resilient market data gateway")]
struct Args {
    /// Path to a TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "market-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        provider = %config.provider.base_url,
        failure_threshold = config.circuit_breaker.failure_threshold,
        cooldown_ms = config.circuit_breaker.cooldown_ms,
        quote_ttl_secs = config.cache.quote_ttl_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    // Both handles must outlive the server: the watcher feeds reloads, and
    // without a config file the idle sender keeps the channel open.
    let (_watcher, _idle_updates, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), None, updates)
        }
        None => {
            let (tx, updates) = mpsc::unbounded_channel();
            (None, Some(tx), updates)
        }
    };

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
