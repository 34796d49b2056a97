pub mod health;
pub mod telemetry;

use axum::response::IntoResponse;
use axum::Router;

use crate::response::AppError;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(telemetry::router())
        .nest("/health", health::router())
        .fallback(fallback_404)
        .with_state(state)
}

async fn fallback_404() -> impl IntoResponse {
    AppError::not_found("Not found")
}
