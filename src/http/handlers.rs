//! Market data handlers.
//!
//! Every handler validates its input, builds the cache key, and lets the
//! orchestrator decide between cache, provider and stale fallback.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Serialize;

use crate::http::request::{
    parse, CandlesParams, HistoricalParams, IntradayParams, ProfileParams, QuoteParams,
    SearchParams, SymbolsParams,
};
use crate::http::response::{served, ApiError, Delivery, Freshness};
use crate::http::server::AppState;
use crate::market::symbol::{normalize_query, normalize_symbol, validate_interval, validate_period};
use crate::market::{sanitize_candles, Candle, Exchange, Quote, SymbolMatch};

/// Breaker partition for symbol search, which is not tied to one exchange.
pub const SEARCH_PARTITION: &str = "SEARCH";

const INTRADAY_RANGE: &str = "1d";
const MAX_SYMBOL_LIMIT: usize = 100;

#[derive(Serialize)]
struct QuoteBody<'a> {
    exchange: Exchange,
    symbol: &'a str,
    #[serde(flatten)]
    quote: &'a Quote,
}

#[derive(Serialize)]
struct CandlesBody<'a> {
    exchange: Exchange,
    symbol: &'a str,
    interval: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    period: Option<&'a str>,
    candles: &'a [Candle],
}

/// Fundamentals and company bodies share this envelope.
#[derive(Serialize)]
struct ProfileBody<'a, T> {
    exchange: Exchange,
    symbol: &'a str,
    #[serde(flatten)]
    profile: &'a T,
}

#[derive(Serialize)]
struct SearchBody<'a> {
    query: &'a str,
    results: &'a [SymbolMatch],
}

#[derive(Serialize)]
struct SymbolsBody<'a> {
    symbols: &'a [SymbolMatch],
    count: usize,
}

fn finish(schema_version: &str, result: Result<Response, ApiError>) -> Response {
    result.unwrap_or_else(|err| err.respond(schema_version))
}

/// GET /quote and /price/latest
pub async fn quote(
    State(state): State<AppState>,
    query: Result<Query<QuoteParams>, QueryRejection>,
) -> Response {
    let schema_version = state.schema_version();
    finish(&schema_version, quote_inner(&state, &schema_version, query).await)
}

async fn quote_inner(
    state: &AppState,
    schema_version: &str,
    query: Result<Query<QuoteParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = parse(query)?;
    let symbol = normalize_symbol(&params.symbol)?;
    let exchange: Exchange = params.exchange.parse()?;

    let key = format!("quote:{}:{}", exchange, symbol);
    let ttl = state.config.load().cache.quote_ttl();
    let outcome = state
        .quotes
        .resolve(exchange.as_str(), &key, ttl, || {
            state.provider.fetch_quote(&symbol, exchange)
        })
        .await;

    let delivery = Delivery::from_outcome(outcome, exchange.as_str())?;
    Ok(served(
        schema_version,
        delivery.freshness,
        QuoteBody {
            exchange,
            symbol: &symbol,
            quote: &delivery.value,
        },
    ))
}

/// GET /intraday
pub async fn intraday(
    State(state): State<AppState>,
    query: Result<Query<IntradayParams>, QueryRejection>,
) -> Response {
    let schema_version = state.schema_version();
    finish(&schema_version, intraday_inner(&state, &schema_version, query).await)
}

async fn intraday_inner(
    state: &AppState,
    schema_version: &str,
    query: Result<Query<IntradayParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = parse(query)?;
    let symbol = normalize_symbol(&params.symbol)?;
    let exchange: Exchange = params.exchange.parse()?;
    let interval = validate_interval(&params.interval)?;

    let key = format!("intraday:{}:{}:{}", exchange, symbol, interval);
    let ttl = state.config.load().cache.intraday_ttl();
    candles_response(
        state,
        schema_version,
        CandleRequest {
            exchange,
            symbol: &symbol,
            interval,
            period: None,
            range: INTRADAY_RANGE,
            key: &key,
            ttl,
        },
    )
    .await
}

/// GET /historical
pub async fn historical(
    State(state): State<AppState>,
    query: Result<Query<HistoricalParams>, QueryRejection>,
) -> Response {
    let schema_version = state.schema_version();
    let result = match parse(query) {
        Ok(params) => historical_inner(&state, &schema_version, params).await,
        Err(err) => Err(err),
    };
    finish(&schema_version, result)
}

/// GET /candles
pub async fn candles(
    State(state): State<AppState>,
    query: Result<Query<CandlesParams>, QueryRejection>,
) -> Response {
    let schema_version = state.schema_version();
    let result = match parse(query) {
        Ok(params) => historical_inner(&state, &schema_version, params.into()).await,
        Err(err) => Err(err),
    };
    finish(&schema_version, result)
}

async fn historical_inner(
    state: &AppState,
    schema_version: &str,
    params: HistoricalParams,
) -> Result<Response, ApiError> {
    let symbol = normalize_symbol(&params.symbol)?;
    let exchange: Exchange = params.exchange.parse()?;
    let interval = validate_interval(&params.interval)?;
    let period = validate_period(&params.period)?;

    let key = format!("historical:{}:{}:{}:{}", exchange, symbol, period, interval);
    let ttl = state.config.load().cache.historical_ttl();
    candles_response(
        state,
        schema_version,
        CandleRequest {
            exchange,
            symbol: &symbol,
            interval,
            period: Some(period),
            range: period,
            key: &key,
            ttl,
        },
    )
    .await
}

struct CandleRequest<'a> {
    exchange: Exchange,
    symbol: &'a str,
    interval: &'a str,
    period: Option<&'a str>,
    range: &'a str,
    key: &'a str,
    ttl: std::time::Duration,
}

async fn candles_response(
    state: &AppState,
    schema_version: &str,
    req: CandleRequest<'_>,
) -> Result<Response, ApiError> {
    let outcome = state
        .candles
        .resolve(req.exchange.as_str(), req.key, req.ttl, || async {
            state
                .provider
                .fetch_candles(req.symbol, req.exchange, req.interval, req.range)
                .await
                .map(sanitize_candles)
        })
        .await;

    let delivery = Delivery::from_outcome(outcome, req.exchange.as_str())?;
    Ok(served(
        schema_version,
        delivery.freshness,
        CandlesBody {
            exchange: req.exchange,
            symbol: req.symbol,
            interval: req.interval,
            period: req.period,
            candles: &delivery.value,
        },
    ))
}

/// GET /fundamentals
pub async fn fundamentals(
    State(state): State<AppState>,
    query: Result<Query<ProfileParams>, QueryRejection>,
) -> Response {
    let schema_version = state.schema_version();
    finish(&schema_version, fundamentals_inner(&state, &schema_version, query).await)
}

async fn fundamentals_inner(
    state: &AppState,
    schema_version: &str,
    query: Result<Query<ProfileParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = parse(query)?;
    let symbol = normalize_symbol(&params.symbol)?;
    let exchange: Exchange = params.exchange.parse()?;

    let key = format!("fundamentals:{}:{}", exchange, symbol);
    let ttl = state.config.load().cache.fundamentals_ttl();
    let outcome = state
        .fundamentals
        .resolve(exchange.as_str(), &key, ttl, || {
            state.provider.fetch_fundamentals(&symbol, exchange)
        })
        .await;

    let delivery = Delivery::from_outcome(outcome, exchange.as_str())?;
    Ok(served(
        schema_version,
        delivery.freshness,
        ProfileBody {
            exchange,
            symbol: &symbol,
            profile: &delivery.value,
        },
    ))
}

/// GET /company
pub async fn company(
    State(state): State<AppState>,
    query: Result<Query<ProfileParams>, QueryRejection>,
) -> Response {
    let schema_version = state.schema_version();
    finish(&schema_version, company_inner(&state, &schema_version, query).await)
}

async fn company_inner(
    state: &AppState,
    schema_version: &str,
    query: Result<Query<ProfileParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = parse(query)?;
    let symbol = normalize_symbol(&params.symbol)?;
    let exchange: Exchange = params.exchange.parse()?;

    let key = format!("company:{}:{}", exchange, symbol);
    let ttl = state.config.load().cache.company_ttl();
    let outcome = state
        .companies
        .resolve(exchange.as_str(), &key, ttl, || {
            state.provider.fetch_company(&symbol, exchange)
        })
        .await;

    let delivery = Delivery::from_outcome(outcome, exchange.as_str())?;
    Ok(served(
        schema_version,
        delivery.freshness,
        ProfileBody {
            exchange,
            symbol: &symbol,
            profile: &delivery.value,
        },
    ))
}

/// GET /search
pub async fn search(
    State(state): State<AppState>,
    query: Result<Query<SearchParams>, QueryRejection>,
) -> Response {
    let schema_version = state.schema_version();
    finish(&schema_version, search_inner(&state, &schema_version, query).await)
}

async fn search_inner(
    state: &AppState,
    schema_version: &str,
    query: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = parse(query)?;
    let query = normalize_query(&params.query)?;
    let delivery = resolve_search(state, &query).await?;
    Ok(served(
        schema_version,
        delivery.freshness,
        SearchBody {
            query: &query,
            results: &delivery.value,
        },
    ))
}

/// GET /symbols
pub async fn symbols(
    State(state): State<AppState>,
    query: Result<Query<SymbolsParams>, QueryRejection>,
) -> Response {
    let schema_version = state.schema_version();
    finish(&schema_version, symbols_inner(&state, &schema_version, query).await)
}

async fn symbols_inner(
    state: &AppState,
    schema_version: &str,
    query: Result<Query<SymbolsParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = parse(query)?;
    let limit = params.limit.min(MAX_SYMBOL_LIMIT);
    if params.query.trim().is_empty() {
        return Ok(served(
            schema_version,
            Freshness::Live { cache_hit: false },
            SymbolsBody {
                symbols: &[],
                count: 0,
            },
        ));
    }

    let query = normalize_query(&params.query)?;
    let delivery = resolve_search(state, &query).await?;
    let symbols = &delivery.value[..delivery.value.len().min(limit)];
    Ok(served(
        schema_version,
        delivery.freshness,
        SymbolsBody {
            symbols,
            count: symbols.len(),
        },
    ))
}

async fn resolve_search(
    state: &AppState,
    query: &str,
) -> Result<Delivery<Vec<SymbolMatch>>, ApiError> {
    let key = format!("search:{}", query);
    let ttl = state.config.load().cache.search_ttl();
    let outcome = state
        .searches
        .resolve(SEARCH_PARTITION, &key, ttl, || state.provider.search(query))
        .await;
    Delivery::from_outcome(outcome, SEARCH_PARTITION)
}
