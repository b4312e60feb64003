use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health_handler, redirect_handler, shorten_handler};
use crate::state::AppState;

pub struct App {}

impl App {
    /// Static routes take precedence, so `/health` and `/shorten` are never
    /// treated as short codes.
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/shorten", post(shorten_handler))
            .route("/{short_code}", get(redirect_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }
}
