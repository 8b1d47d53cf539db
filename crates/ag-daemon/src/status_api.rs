//! The read-only status server.
//!
//! `GET /status` serves the tracker snapshot enriched with uptime and the
//! time left before the next agent post; `/health` and `/metrics` cover
//! liveness and Prometheus scraping.

use std::sync::Arc;
use std::time::Duration;

use ag_core::agents::{AgentProfile, AgentRegistry};
use ag_telemetry::metrics::global_metrics;
use ag_telemetry::middleware::{metrics_middleware, request_id_middleware};
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::status::{next_post_in, StatusSnapshot, StatusTracker};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// State & response types
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct StatusState {
    pub tracker: StatusTracker,
    pub registry: Arc<AgentRegistry>,
    pub min_post_interval: Duration,
}

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub snapshot: StatusSnapshot,
    pub uptime: String,
    pub uptime_seconds: u64,
    /// Seconds until the next post is allowed; 0 when one is due now.
    pub next_post_in: f64,
    pub agents: Vec<AgentProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Assemble the `/status` body for `now`.
pub fn status_response(
    snapshot: StatusSnapshot,
    registry: &AgentRegistry,
    min_post_interval: Duration,
    now: DateTime<Utc>,
) -> StatusResponse {
    let uptime = now
        .signed_duration_since(snapshot.started_at)
        .to_std()
        .unwrap_or(Duration::ZERO);
    let next = next_post_in(snapshot.last_post_time, now, min_post_interval);

    StatusResponse {
        uptime: format_uptime(uptime),
        uptime_seconds: uptime.as_secs(),
        next_post_in: next.as_secs_f64(),
        agents: registry.all().to_vec(),
        snapshot,
    }
}

/// `H:MM:SS`, prefixed with `N day(s), ` past the first day.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    match days {
        0 => format!("{hours}:{minutes:02}:{seconds:02}"),
        1 => format!("1 day, {hours}:{minutes:02}:{seconds:02}"),
        d => format!("{d} days, {hours}:{minutes:02}:{seconds:02}"),
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn status_router(state: StatusState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .fallback(not_found)
        .with_state(state)
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn get_status(State(state): State<StatusState>) -> Json<StatusResponse> {
    let snapshot = state.tracker.snapshot().await;
    Json(status_response(
        snapshot,
        &state.registry,
        state.min_post_interval,
        Utc::now(),
    ))
}

async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

async fn get_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        global_metrics().export_prometheus(),
    )
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
