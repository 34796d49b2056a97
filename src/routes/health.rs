use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}

pub async fn health_check(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "uptimeSecs": state.uptime_secs(),
        "activeSessions": state.sessions().active(),
        "maxSessions": state.config().limits.max_sessions,
        "landmarker": state.landmarker().name(),
    }))
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

pub async fn readiness() -> StatusCode {
    StatusCode::OK
}
