use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::redmine_client::TrackerError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {message}")]
    Validation { message: String },
    #[error("{label}: {source}")]
    Upstream {
        label: &'static str,
        source: TrackerError,
    },
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Wire shape of every failed response: an error label plus the
/// underlying failure's message text.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn upstream(label: &'static str, source: TrackerError) -> Self {
        Self::Upstream { label, source }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            Self::Validation { message } => {
                (StatusCode::BAD_REQUEST, "invalid request".to_string(), message)
            }
            Self::Upstream { label, source } => {
                tracing::error!(error = %source, label, "upstream call failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    label.to_string(),
                    source.to_string(),
                )
            }
            Self::Internal { message } => {
                tracing::error!(error = %message, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                    message,
                )
            }
        };

        (status, Json(ErrorResponse { error, message })).into_response()
    }
}
