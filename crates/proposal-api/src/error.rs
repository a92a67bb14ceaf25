//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Lifecycle errors keep their machine-readable code on the wire; storage
//! internals never reach a response body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use proposal_state::{ErrorCode, LifecycleError};

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "INVALID_TRANSITION", "MISSING_FIELD").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Structured context for client errors (offending field, attempted move).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// A lifecycle rule, lookup or storage failure.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Authentication failure (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Lifecycle(err) => {
                let code = err.code();
                let status = match code {
                    ErrorCode::InvalidTransition
                    | ErrorCode::AlreadyImmutable
                    | ErrorCode::Conflict => StatusCode::CONFLICT,
                    ErrorCode::MissingField => StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorCode::NotFound => StatusCode::NOT_FOUND,
                    ErrorCode::PersistenceFailure | ErrorCode::IntegrityViolation => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, code.as_str())
            }
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Internal errors whose text must not leave the process.
    fn is_opaque(&self) -> bool {
        match self {
            Self::Internal(_) => true,
            Self::Lifecycle(err) => matches!(
                err,
                LifecycleError::Persistence(_) | LifecycleError::Canonicalization(_)
            ),
            _ => false,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Lifecycle(LifecycleError::MissingField { field }) => {
                Some(serde_json::json!({ "field": field }))
            }
            Self::Lifecycle(LifecycleError::InvalidTransition { from, to, .. }) => {
                Some(serde_json::json!({ "from": from, "to": to }))
            }
            Self::Lifecycle(LifecycleError::ConcurrentModification { expected, .. }) => {
                Some(serde_json::json!({ "expectedStatus": expected }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if self.is_opaque() {
            tracing::error!(error = %self, code, "internal server error");
            match &self {
                Self::Lifecycle(_) => "The operation could not be persisted".to_string(),
                _ => "An internal error occurred".to_string(),
            }
        } else {
            if status.is_server_error() {
                tracing::error!(error = %self, code, "server error");
            }
            self.to_string()
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}
