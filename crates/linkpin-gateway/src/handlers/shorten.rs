use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use crate::error::Result;
use crate::model::{ShortenRequest, ShortenResponse};
use crate::state::AppState;

pub async fn shorten_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ShortenResponse>)> {
    let Json(request) = payload?;
    let shortened = state.shortener().shorten(&request.original_url).await?;

    info!(code = %shortened.code, "short url created");
    Ok((
        StatusCode::CREATED,
        Json(ShortenResponse {
            short_url: shortened.short_url,
        }),
    ))
}
