use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use gifthive_types::api::{Envelope, ErrorBody};

/// Every failure a controller can report. Rendered as
/// `{success: false, response: {message, errors?}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input.
    #[error("{message}")]
    Validation {
        message: String,
        errors: Option<Value>,
    },

    /// A unique resource (the username) already exists.
    #[error("{0}")]
    Duplicate(String),

    /// Missing record, or one the caller does not own.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            errors: None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::Duplicate(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            Self::Validation { message, errors } => ErrorBody { message, errors },
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                ErrorBody {
                    message: "Internal server error".into(),
                    errors: None,
                }
            }
            other => ErrorBody {
                message: other.to_string(),
                errors: None,
            },
        };

        (status, Json(Envelope::err(body))).into_response()
    }
}
