//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fetcheach_common::{FetchEachError, ResultEntry};
use serde_json::json;
use thiserror::Error;

use crate::coordinator::CoordinatorError;
use crate::queue::QueueError;
use crate::store::StoreError;

/// Result type alias for request handlers
pub type ServerResult<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The job did not complete within the poll ceiling
    #[error("{message}")]
    Timeout {
        message: String,
        array: Vec<ResultEntry>,
    },

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<FetchEachError> for AppError {
    fn from(err: FetchEachError) -> Self {
        match err {
            FetchEachError::InvalidInput(message) => AppError::BadRequest(message),
            err @ FetchEachError::InvalidItem { .. } => AppError::BadRequest(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<CoordinatorError> for AppError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::Timeout { message, partial } => AppError::Timeout {
                message,
                array: partial.array,
            },
            CoordinatorError::Store(e) => AppError::Store(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Unauthorized(ref message) => (StatusCode::UNAUTHORIZED, message.clone()),
            AppError::BadRequest(ref message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::Timeout { message, array } => {
                tracing::warn!(partial = array.len(), "{}", message);
                let status = StatusCode::GATEWAY_TIMEOUT;
                let body = Json(json!({
                    "error": {
                        "message": message,
                        "status": status.as_u16(),
                    },
                    "array": array,
                }));
                return (status, body).into_response();
            }
            AppError::Queue(ref e) => {
                tracing::error!("Queue error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Something went wrong: {}", e))
            }
            AppError::Store(ref e) => {
                tracing::error!("Store error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "A storage error occurred".to_string())
            }
            AppError::Internal(ref message) => {
                tracing::error!("Internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Something went wrong: {}", message))
            }
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}
