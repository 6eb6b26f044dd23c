//! ==============================================================================
//! http.rs - rest + sse surface
//! ==============================================================================
//!
//! purpose:
//!     thin axum layer over the hub. routes match what the field nodes and
//!     the dashboard already talk to:
//!
//!     POST /api/sensors/data            ingest one reading
//!     GET  /api/sensors/stream          sse: `initial` snapshot, then `update`s
//!     GET  /api/sensors                 every sensor's latest state
//!     GET  /api/sensors/latest?limit=   most recently updated sensors (default 10)
//!     GET  /api/sensors/:id/data?limit= one sensor's history (default 100)
//!     GET  /api/sensors/stats/global    last values per sensor
//!     GET  /api/health                  counters
//!
//! a bad `limit` falls back to the default instead of failing the request.
//!
//! ==============================================================================

use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::Uri,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::CorsLayer;

use crate::domain::{HealthReport, RawReading, SensorState, SensorStats};
use crate::error::{HubError, Result};
use crate::health::HealthReporter;
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::hub::Hub;
use crate::query::QueryService;
use crate::registry::DEFAULT_LATEST_LIMIT;

#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub queries: QueryService,
    pub health: HealthReporter,
    pub keep_alive: Duration,
}

impl AppState {
    pub fn new(hub: Hub, keep_alive: Duration) -> Self {
        Self {
            queries: QueryService::new(hub.clone()),
            health: HealthReporter::new(hub.clone()),
            hub,
            keep_alive,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/sensors", get(list_sensors))
        .route("/api/sensors/data", post(ingest_reading))
        .route("/api/sensors/stream", get(stream))
        .route("/api/sensors/latest", get(latest))
        .route("/api/sensors/stats/global", get(global_stats))
        .route("/api/sensors/:sensor_id/data", get(sensor_history))
        .route("/api/health", get(health))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    limit: Option<String>,
}

/// positive integer or the default
fn parse_limit(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(default)
}

// POST /api/sensors/data
async fn ingest_reading(
    State(app): State<AppState>,
    payload: std::result::Result<Json<RawReading>, JsonRejection>,
) -> Result<Json<serde_json::Value>> {
    let Json(raw) = payload.map_err(|e| {
        tracing::warn!("[HTTP] unreadable reading body: {}", e);
        HubError::validation("body", e.body_text())
    })?;

    let reading = app.hub.ingest(&raw)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "reading stored and broadcast",
        "data": reading,
    })))
}

// GET /api/sensors/stream
async fn stream(
    State(app): State<AppState>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>> {
    let subscription = app.hub.subscribe()?;
    tracing::debug!("[HTTP] sse client is observer {}", subscription.id());
    let events = subscription.map(|event| Event::default().json_data(event));
    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(app.keep_alive)))
}

// GET /api/sensors
async fn list_sensors(State(app): State<AppState>) -> Json<Vec<SensorState>> {
    Json(app.queries.list_sensors())
}

// GET /api/sensors/latest
async fn latest(
    State(app): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<SensorState>> {
    let limit = parse_limit(params.limit.as_deref(), DEFAULT_LATEST_LIMIT);
    Json(app.queries.get_latest(limit))
}

// GET /api/sensors/:sensor_id/data
async fn sensor_history(
    State(app): State<AppState>,
    Path(sensor_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<crate::domain::Reading>> {
    let limit = parse_limit(params.limit.as_deref(), DEFAULT_HISTORY_LIMIT);
    Json(app.queries.get_sensor_history(&sensor_id, limit))
}

// GET /api/sensors/stats/global
async fn global_stats(State(app): State<AppState>) -> Json<Vec<SensorStats>> {
    Json(app.queries.global_stats())
}

// GET /api/health
async fn health(State(app): State<AppState>) -> Json<HealthReport> {
    Json(app.health.report())
}

async fn not_found(uri: Uri) -> HubError {
    HubError::NotFound(uri.path().to_string())
}
