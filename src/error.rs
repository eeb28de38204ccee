//! Error types shared by the store, transports and HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Every failure the timer can report.
#[derive(Debug, Error)]
pub enum TimerError {
    /// Bad or missing input; `field` names the offending field.
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("method not allowed")]
    MethodNotAllowed,

    /// The action is well formed but not permitted in the current run state.
    #[error("{0}")]
    Conflict(String),

    /// Reading or writing the state file failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Talking to a remote state source or object store failed.
    #[error("remote sync error: {0}")]
    RemoteSync(String),

    /// A mutating write was attempted without admin credentials.
    #[error("authorization required: {0}")]
    Authorization(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result alias for timer operations.
pub type TimerResult<T> = Result<T, TimerError>;

impl TimerError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Authorization(_) => StatusCode::UNAUTHORIZED,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RemoteSync(_) | Self::Http(_))
    }
}

impl IntoResponse for TimerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}
