//! Error types for bibup-queue
//!
//! - `FetchError`: outcome taxonomy of a metadata lookup for one row
//! - `CommitError`: why one row's accepted changes could not be written
//! - `ApiError`: HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bibup_common::ItemId;
use serde_json::json;
use thiserror::Error;

/// Metadata lookup failure for one row
///
/// None of these halt the queue; the row is marked failed and the worker moves on.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Item vanished before the lookup completed
    #[error("Item {0} not found")]
    NotFound(ItemId),

    /// User-facing alert raised by the metadata source; shown verbatim
    #[error("{0}")]
    Alert(String),

    /// Anything else; logged, never shown raw
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<bibup_common::Error> for FetchError {
    fn from(err: bibup_common::Error) -> Self {
        FetchError::Other(anyhow::Error::new(err))
    }
}

/// Failure to commit one row's accepted changes
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("Item {0} no longer exists")]
    NotFound(ItemId),

    #[error("Unknown item type: {0}")]
    UnknownType(String),

    #[error("Field {0} has an unexpected value shape")]
    MalformedValue(String),

    #[error("Storage error: {0}")]
    Storage(#[from] bibup_common::Error),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// bibup-common error
    #[error("Common error: {0}")]
    Common(#[from] bibup_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Common(bibup_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg)
            }
            ApiError::Common(bibup_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_message_is_verbatim() {
        let err = FetchError::Alert("No metadata could be found for this item".to_string());
        assert_eq!(err.to_string(), "No metadata could be found for this item");
    }

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::NotFound("row".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Common(bibup_common::Error::InvalidInput("x".into()))
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Common(bibup_common::Error::Internal("x".into()))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
