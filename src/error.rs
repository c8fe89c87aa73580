// Error types: backend failures (store / index) and HTTP-facing application errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

/// Failure of an external collaborator (document store or hosted index).
/// Search operations recover from these locally; they never reach the UI.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{backend} responded with status {status}")]
    Status {
        backend: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("Malformed response from {backend}: {message}")]
    Malformed {
        backend: &'static str,
        message: String,
    },
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Search index is not configured")]
    IndexUnavailable,
}

pub type BackendResult<T> = Result<T, BackendError>;

// Application error type returned by the HTTP handlers. Backend failures never
// get here: search degrades to empty results instead.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::BadRequest(message) => {
                tracing::warn!("Bad request: {}", message);
                (StatusCode::BAD_REQUEST, message)
            }
        };

        let body = Json(json!({ "success": false, "error": error_message }));
        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_errors_map_to_client_statuses() {
        let not_found = AppError::NotFound("Listing 'x' not found".to_string()).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let bad_request = AppError::BadRequest("ids must not be empty".to_string()).into_response();
        assert_eq!(bad_request.status(), StatusCode::BAD_REQUEST);
    }
}
