use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy shared by every layer.
///
/// Recoverable domain errors (`NotFound`, `InvalidInput`, `NoActiveIndex`,
/// `UnsupportedFormat`) map to 4xx responses. Capability failures
/// (`Embedding`, `Generation`) and `Internal` map to 5xx. `StateMismatch`
/// is an internal signal that an incremental index update was attempted
/// against the wrong binding; callers are expected to fall back to a full
/// rebuild rather than surface it.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no active index")]
    NoActiveIndex,
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("index binding mismatch: {0}")]
    StateMismatch(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }

    /// True for errors a caller can act on without operator intervention.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ApiError::NotFound(_)
                | ApiError::InvalidInput(_)
                | ApiError::NoActiveIndex
                | ApiError::UnsupportedFormat(_)
                | ApiError::StateMismatch(_)
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NoActiveIndex => (
                StatusCode::BAD_REQUEST,
                "No document uploaded yet. Please upload a document first.".to_string(),
            ),
            ApiError::UnsupportedFormat(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::StateMismatch(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ApiError::Embedding(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Embedding failed: {}", msg),
            ),
            ApiError::Generation(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to process question: {}", msg),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
