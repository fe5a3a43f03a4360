//! Liveness, readiness, health, and metrics endpoint handlers.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::lifecycle::HealthState;

/// Liveness probe: always 200 while the process can answer.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 200 only while the listener is serving and the injected
/// probe (bus connectivity in production) reports ready; 503 otherwise,
/// including during startup and drain.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if is_ready(&state) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Detailed health as JSON. Always 200; `state` and `ready` carry the verdict.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "state": state.shutdown.health_state().as_str(),
        "ready": is_ready(&state),
        "uptimeSecs": state.start_time.elapsed().as_secs(),
    }))
}

/// Prometheus text exposition of every recorded metric.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn is_ready(state: &AppState) -> bool {
    state.shutdown.health_state() == HealthState::Ready && state.readiness.is_ready()
}
