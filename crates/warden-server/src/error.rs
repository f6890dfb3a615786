//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use warden_core::coordinator::{BlockCategory, BlockedRequest};
use warden_core::{CoordinatorError, QueueError, ReviewId};

/// API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request rejected by content screening.
    #[error("request blocked: {}", .0.risk_category)]
    Blocked(BlockedRequest),

    /// Malformed request.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown review id.
    #[error("review not found: {0}")]
    ReviewNotFound(ReviewId),

    /// Review already resolved.
    #[error("review already resolved: {0}")]
    ReviewAlreadyResolved(ReviewId),

    /// Server is shutting down.
    #[error("request cancelled: server is shutting down")]
    Cancelled,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] warden_storage::StorageError),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Error response body for a blocked request.
///
/// Carries the category only. The matched text is never echoed back.
#[derive(Debug, Serialize)]
pub struct BlockedResponse {
    pub error: String,
    pub code: String,
    pub risk_category: BlockCategory,
    pub escalation_message: String,
    pub review_id: Option<ReviewId>,
}

impl From<CoordinatorError> for ApiError {
    fn from(e: CoordinatorError) -> Self {
        match e {
            CoordinatorError::Validation(msg) => ApiError::Validation(msg),
            CoordinatorError::Blocked(blocked) => ApiError::Blocked(blocked),
            CoordinatorError::Cancelled => ApiError::Cancelled,
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::NotFound(id) => ApiError::ReviewNotFound(id),
            QueueError::AlreadyReviewed(id) => ApiError::ReviewAlreadyResolved(id),
            QueueError::Storage(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Blocked(_) => (StatusCode::BAD_REQUEST, "blocked_content"),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ApiError::ReviewNotFound(_) => (StatusCode::NOT_FOUND, "review_not_found"),
            ApiError::ReviewAlreadyResolved(_) => (StatusCode::CONFLICT, "review_already_resolved"),
            ApiError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "cancelled"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        };

        let error = self.to_string();

        if let ApiError::Blocked(blocked) = self {
            let body = BlockedResponse {
                error,
                code: code.to_string(),
                risk_category: blocked.risk_category,
                escalation_message: blocked.escalation_message,
                review_id: blocked.review_id,
            };
            return (status, axum::Json(body)).into_response();
        }

        let body = ErrorResponse {
            error,
            code: code.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;
