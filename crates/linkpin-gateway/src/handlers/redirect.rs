use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::Result;
use crate::state::AppState;

pub async fn redirect_handler(
    State(state): State<AppState>,
    Path(short_code): Path<String>,
) -> Result<Response> {
    let response = match state.shortener().redirect(&short_code).await? {
        Some(mapping) => (
            StatusCode::MOVED_PERMANENTLY,
            [(header::LOCATION, mapping.original_url)],
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    };
    Ok(response)
}
