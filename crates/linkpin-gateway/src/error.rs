use axum::extract::rejection::JsonRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use linkpin_shortener::ShortenerError;
use serde::Serialize;
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Seconds a client should wait before retrying after a 503.
const RETRY_AFTER_SECS: &str = "1";

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    /// A dependency is down; the request may be retried.
    Unavailable(String),
    Internal(String),
}

impl From<ShortenerError> for AppError {
    fn from(e: ShortenerError) -> Self {
        match e {
            ShortenerError::InvalidUrl(message) => AppError::BadRequest(message),
            e if e.is_retriable() => AppError::Unavailable(e.to_string()),
            e => AppError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            AppError::Unavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable", message)
            }
            AppError::Internal(message) => {
                error!(error = %message, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorBody {
            error: ErrorInfo { code, message },
        });

        if status == StatusCode::SERVICE_UNAVAILABLE {
            (status, [(header::RETRY_AFTER, RETRY_AFTER_SECS)], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}
