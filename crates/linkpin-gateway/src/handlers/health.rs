use axum::extract::State;
use axum::http::StatusCode;

use crate::state::AppState;

/// 204 when both the allocator primary and a store node answer, 503
/// otherwise.
pub async fn health_handler(State(state): State<AppState>) -> StatusCode {
    if state.shortener().health().await.is_healthy() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
