// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/` and are read-only:
//
//   GET /api/v1/health
//   GET /api/v1/signals
//   GET /api/v1/signals/:symbol
//   GET /api/v1/signals/:symbol/history?limit=N
//
// CORS is permissive; the API exposes no mutating routes.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error};

use crate::app_state::AppState;
use crate::types::SignalResult;

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 500;

// =============================================================================
// Router construction
// =============================================================================

/// Build the REST router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/signals", get(all_signals))
        .route("/api/v1/signals/:symbol", get(signal_for))
        .route("/api/v1/signals/:symbol/history", get(signal_history))
        .layer(cors)
        .with_state(state)
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

/// Upper-cased symbol, or 404 when the engine does not track it.
fn tracked_symbol(state: &AppState, raw: &str) -> Result<String, ApiError> {
    let symbol = raw.trim().to_uppercase();
    if state.is_tracked(&symbol) {
        Ok(symbol)
    } else {
        Err(api_error(
            StatusCode::NOT_FOUND,
            format!("symbol '{symbol}' is not tracked"),
        ))
    }
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct SymbolData {
    symbol: String,
    candles: usize,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    server_time: i64,
    uptime_secs: i64,
    symbols: Vec<String>,
    signals_available: usize,
    /// Symbols with any market data in the store.
    stored_symbols: Vec<String>,
    candle_interval: String,
    data: Vec<SymbolData>,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let data = state
        .candle_counts()
        .into_iter()
        .map(|(symbol, candles)| SymbolData { symbol, candles })
        .collect();

    Json(HealthResponse {
        status: "ok",
        server_time: chrono::Utc::now().timestamp_millis(),
        uptime_secs: state.uptime_secs(),
        symbols: state.engine.symbols().to_vec(),
        signals_available: state.engine.latest().len(),
        stored_symbols: state.store.symbols(),
        candle_interval: state.engine.candle_interval().to_string(),
        data,
    })
}

// =============================================================================
// Signals
// =============================================================================

async fn all_signals(State(state): State<Arc<AppState>>) -> Json<Vec<SignalResult>> {
    Json(state.engine.latest())
}

async fn signal_for(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<SignalResult>, ApiError> {
    let symbol = tracked_symbol(&state, &symbol)?;
    state.engine.latest_for(&symbol).map(Json).ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("no signal computed yet for '{symbol}'"),
        )
    })
}

#[derive(Debug, Default, Deserialize)]
struct HistoryQuery {
    #[serde(default)]
    limit: Option<usize>,
}

impl HistoryQuery {
    fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT)
    }
}

async fn signal_history(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<SignalResult>>, ApiError> {
    let symbol = tracked_symbol(&state, &symbol)?;
    let limit = query.effective_limit();
    debug!(symbol = %symbol, limit, "signal history requested");

    state
        .engine
        .get_signal_history(&symbol, limit)
        .await
        .map(Json)
        .map_err(|e| {
            error!(symbol = %symbol, error = %e, "signal history lookup failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "history unavailable")
        })
}
