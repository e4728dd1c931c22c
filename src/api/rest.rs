// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Analysis endpoints are public; the
// configuration endpoints require a valid Bearer token checked via the
// `AuthBearer` extractor.
//
// CORS is configured permissively; tighten `allow_origin` in production.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::analytics::returns::daily_returns;
use crate::analytics::{RiskConfig, RiskReport};
use crate::api::auth::AuthBearer;
use crate::api::{ApiError, ApiResult};
use crate::app_state::{AppState, MarketSnapshot};
use crate::indicators::catalog::{self, CatalogEntry, IndicatorKind, IndicatorOutput, IndicatorParams};
use crate::market_data::{Bars, CandleKey};
use crate::runtime_config::{parse_symbol_list, RuntimeConfig};

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/indicators", get(list_indicators))
        .route("/api/v1/indicators/:name", post(compute_indicator))
        .route("/api/v1/markets", get(list_markets))
        .route(
            "/api/v1/market/:symbol/:interval/indicators/:name",
            get(market_indicator),
        )
        .route("/api/v1/market/:symbol/:interval/snapshot", get(market_snapshot))
        .route("/api/v1/analysis/risk", post(risk_report))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/config", get(get_config))
        .route("/api/v1/config/symbols", post(set_symbols))
        // ── WebSocket (handled separately in ws module but mounted here) ─
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health (public)
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    data_version: u64,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        data_version: state.data_version(),
        uptime_secs: state.uptime_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Indicator catalog & stateless computation
// =============================================================================

async fn list_indicators() -> Json<Vec<CatalogEntry>> {
    Json(catalog::catalog())
}

#[derive(Debug, Deserialize)]
struct ComputeRequest {
    bars: Bars,
    #[serde(default)]
    params: IndicatorParams,
}

async fn compute_indicator(
    Path(name): Path<String>,
    Json(req): Json<ComputeRequest>,
) -> ApiResult<Json<IndicatorOutput>> {
    let kind: IndicatorKind = name.parse()?;
    debug!(indicator = %kind, bars = req.bars.len(), "stateless indicator request");
    let output = catalog::compute(kind, &req.bars, &req.params)?;
    Ok(Json(output))
}

// =============================================================================
// Buffered market data
// =============================================================================

#[derive(Serialize)]
struct MarketInfo {
    symbol: String,
    interval: String,
    candles: usize,
    last_close: Option<f64>,
}

async fn list_markets(State(state): State<Arc<AppState>>) -> Json<Vec<MarketInfo>> {
    let buffer = &state.candle_buffer;
    let markets = buffer
        .keys()
        .into_iter()
        .map(|key| MarketInfo {
            candles: buffer.count(&key),
            last_close: buffer.last_close(&key),
            symbol: key.symbol,
            interval: key.interval,
        })
        .collect();
    Json(markets)
}

#[derive(Serialize)]
struct MarketIndicatorResponse {
    symbol: String,
    interval: String,
    open_time: Vec<i64>,
    #[serde(flatten)]
    output: IndicatorOutput,
}

async fn market_indicator(
    State(state): State<Arc<AppState>>,
    Path((symbol, interval, name)): Path<(String, String, String)>,
    Query(mut query): Query<HashMap<String, String>>,
) -> ApiResult<Json<MarketIndicatorResponse>> {
    let kind: IndicatorKind = name.parse()?;
    let key = CandleKey::new(&symbol, &interval);

    let limit = match query.remove("limit") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| ApiError::BadRequest(format!("invalid limit '{raw}'")))?,
        None => usize::MAX,
    };

    let candles = state.candle_buffer.get_closed(&key, limit);
    if candles.is_empty() {
        return Err(ApiError::NotFound(format!("no candles buffered for {key}")));
    }
    let bars = Bars::from_candles(&candles);
    let params = IndicatorParams::from(query);
    debug!(key = %key, indicator = %kind, candles = candles.len(), "market indicator request");

    let output = catalog::compute(kind, &bars, &params)?;
    Ok(Json(MarketIndicatorResponse {
        symbol: key.symbol,
        interval: key.interval,
        open_time: candles.iter().map(|c| c.open_time).collect(),
        output,
    }))
}

async fn market_snapshot(
    State(state): State<Arc<AppState>>,
    Path((symbol, interval)): Path<(String, String)>,
) -> ApiResult<Json<MarketSnapshot>> {
    let key = CandleKey::new(&symbol, &interval);
    state
        .market_snapshot(&key)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no candles buffered for {key}")))
}

// =============================================================================
// Risk report
// =============================================================================

#[derive(Debug, Deserialize)]
struct RiskRequest {
    #[serde(default)]
    returns: Option<Vec<f64>>,
    /// Converted to one-period returns when `returns` is absent.
    #[serde(default)]
    prices: Option<Vec<f64>>,
    #[serde(default)]
    benchmark: Option<Vec<f64>>,
    #[serde(default)]
    config: Option<RiskConfig>,
}

async fn risk_report(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RiskRequest>,
) -> ApiResult<Json<RiskReport>> {
    let returns = match (req.returns, req.prices) {
        (Some(returns), None) => returns,
        (None, Some(prices)) => {
            // The first change is undefined.
            daily_returns(&prices)?.split_off(1)
        }
        _ => {
            return Err(ApiError::BadRequest(
                "exactly one of 'returns' or 'prices' is required".to_string(),
            ))
        }
    };
    let config = req
        .config
        .unwrap_or_else(|| state.runtime_config.read().risk.clone());

    let report = RiskReport::build(&returns, req.benchmark.as_deref(), &config)?;
    Ok(Json(report))
}

// =============================================================================
// Configuration (authenticated)
// =============================================================================

async fn get_config(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> Json<RuntimeConfig> {
    Json(state.runtime_config.read().clone())
}

#[derive(Debug, Deserialize)]
struct SymbolsRequest {
    symbols: Vec<String>,
}

async fn set_symbols(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SymbolsRequest>,
) -> ApiResult<Json<RuntimeConfig>> {
    let symbols = parse_symbol_list(&req.symbols.join(","));
    if symbols.is_empty() {
        return Err(ApiError::BadRequest("symbol list must not be empty".to_string()));
    }

    // Persist first; memory only changes once the file is written.
    let mut snapshot = state.runtime_config.read().clone();
    snapshot.symbols = symbols;
    snapshot.save(&state.config_path)?;

    state.runtime_config.write().symbols = snapshot.symbols.clone();
    state.markets_changed.notify_one();

    info!(symbols = ?snapshot.symbols, "watched symbols updated");
    Ok(Json(snapshot))
}

// =============================================================================
// Tests
// =============================================================================
