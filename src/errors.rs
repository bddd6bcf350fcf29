use axum::{http::StatusCode, Json};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failures raised by the store, the vote ledger and the role gate.
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("{0}")]
    Validation(String),

    #[error("Feedback not found.")]
    NotFound(i64),

    #[error("Log in to vote.")]
    Unauthenticated,

    #[error("Admin access required.")]
    Forbidden,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("malformed stored data: {0}")]
    Json(#[from] serde_json::Error),
}

impl FeedbackError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        error!("request failed: {err}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".to_string(),
        }
    }
}

impl From<FeedbackError> for AppError {
    fn from(err: FeedbackError) -> Self {
        let status = match &err {
            FeedbackError::Validation(_) => StatusCode::BAD_REQUEST,
            FeedbackError::NotFound(_) => StatusCode::NOT_FOUND,
            FeedbackError::Unauthenticated => StatusCode::UNAUTHORIZED,
            FeedbackError::Forbidden => StatusCode::FORBIDDEN,
            FeedbackError::Database(_) | FeedbackError::Json(_) => return Self::internal(err),
        };

        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
