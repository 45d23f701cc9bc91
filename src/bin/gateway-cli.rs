use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the market data gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway liveness
    Health,
    /// Show cache and readiness state
    Readiness,
    /// Show request, cache and latency metrics
    Metrics,
    /// Show circuit breaker state per exchange
    Exchanges,
    /// Fetch a quote
    Quote {
        symbol: String,
        #[arg(short, long, default_value = "NASDAQ")]
        exchange: String,
    },
    /// Fetch valuation ratios and financials
    Fundamentals { symbol: String, exchange: String },
    /// Fetch a company profile
    Company { symbol: String, exchange: String },
    /// Show whether an exchange is in session
    MarketStatus { exchange: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let request = match &cli.command {
        Commands::Health => client.get(format!("{}/health", cli.url)),
        Commands::Readiness => client.get(format!("{}/readiness", cli.url)),
        Commands::Metrics => client.get(format!("{}/metrics", cli.url)),
        Commands::Exchanges => client.get(format!("{}/exchanges/status", cli.url)),
        Commands::Quote { symbol, exchange } => client
            .get(format!("{}/quote", cli.url))
            .query(&[("symbol", symbol), ("exchange", exchange)]),
        Commands::Fundamentals { symbol, exchange } => client
            .get(format!("{}/fundamentals", cli.url))
            .query(&[("symbol", symbol), ("exchange", exchange)]),
        Commands::Company { symbol, exchange } => client
            .get(format!("{}/company", cli.url))
            .query(&[("symbol", symbol), ("exchange", exchange)]),
        Commands::MarketStatus { exchange } => client
            .get(format!("{}/market-status", cli.url))
            .query(&[("exchange", exchange)]),
    };

    let res = request.send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let cache_hit = res
        .headers()
        .get("x-cache-hit")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    if let Some(cache) = cache_hit {
        eprintln!("x-cache-hit: {}", cache);
    }
    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
