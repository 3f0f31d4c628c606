//! Error types for the enrollment protocol and its HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use registration_store::StoreError;
use thiserror::Error;

/// Phase 1 failures.
#[derive(Debug, Error)]
pub enum InitiationError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Failed to write pending registration: {0}")]
    StoreWrite(#[source] StoreError),
}

/// Phase 2 failures.
#[derive(Debug, Error)]
pub enum FinalizationError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("No live pending registration")]
    NotFound,

    #[error("One-time code mismatch")]
    CodeMismatch,

    #[error("Signature does not verify against the claimed identity key")]
    InvalidSignature,

    #[error("Failed to read pending registration: {0}")]
    StoreRead(#[source] StoreError),

    #[error("Failed to write registration state: {0}")]
    StoreWrite(#[source] StoreError),
}

impl FinalizationError {
    /// Machine-stable reason returned to the caller.
    pub fn code(&self) -> &'static str {
        match self {
            FinalizationError::MalformedInput(_) => "MALFORMED_INPUT",
            FinalizationError::NotFound => "NOT_FOUND",
            FinalizationError::CodeMismatch => "CODE_MISMATCH",
            FinalizationError::InvalidSignature => "INVALID_SIGNATURE",
            FinalizationError::StoreRead(_) | FinalizationError::StoreWrite(_) => "STORE_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            FinalizationError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            FinalizationError::CodeMismatch => StatusCode::FORBIDDEN,
            FinalizationError::InvalidSignature => StatusCode::UNAUTHORIZED,
            FinalizationError::NotFound
            | FinalizationError::StoreRead(_)
            | FinalizationError::StoreWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors surfaced by the HTTP handlers and middleware.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Initiation(#[from] InitiationError),

    #[error(transparent)]
    Finalization(#[from] FinalizationError),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            // Initiation never reveals detail beyond the status.
            ApiError::Initiation(InitiationError::MalformedInput(_)) => {
                StatusCode::BAD_REQUEST.into_response()
            }
            ApiError::Initiation(InitiationError::StoreWrite(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            ApiError::Finalization(e) => (e.status(), e.code()).into_response(),
            ApiError::RateLimitExceeded => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED").into_response()
            }
        }
    }
}
