//! Error type shared by every layer of the service
//!
//! Each variant maps onto one HTTP status so handlers can return
//! `Result<_, PushError>` directly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PushError {
    pub fn forbidden(message: &str) -> Self {
        Self::Forbidden(message.to_string())
    }

    pub fn invalid_request(message: &str) -> Self {
        Self::InvalidRequest(message.to_string())
    }

    pub fn storage(message: &str) -> Self {
        Self::Storage(message.to_string())
    }

    pub fn config(message: &str) -> Self {
        Self::Config(message.to_string())
    }

    pub fn internal(message: &str) -> Self {
        Self::Internal(message.to_string())
    }

    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            PushError::Unauthorized => StatusCode::UNAUTHORIZED,
            PushError::Forbidden(_) => StatusCode::FORBIDDEN,
            PushError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PushError::Storage(_)
            | PushError::Config(_)
            | PushError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PushError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
