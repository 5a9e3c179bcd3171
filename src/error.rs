//! Error handling module
//!
//! Provides the unified error type of the HTTP layer and its JSON envelope.

use crate::chain::ChainError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// The draft was saved but the `propose` transaction failed
    #[error("Chain submission failed for draft {draft_id}: {source}")]
    ChainSubmission {
        draft_id: i32,
        onchain_id: String,
        #[source]
        source: ChainError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error envelope: `{ success: false, error, code, requestId }`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onchain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    fn new(code: &str, error: String, details: Option<String>) -> Self {
        Self {
            success: false,
            error,
            code: code.to_string(),
            details,
            draft_id: None,
            onchain_id: None,
            request_id: None,
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Chain(_) | AppError::ChainSubmission { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            AppError::Database(e) => {
                error!("Database error: {:?}", e);
                ErrorResponse::new("DATABASE_ERROR", "A database error occurred".to_string(), None)
            }
            AppError::Pool(e) => {
                error!("Pool error: {:?}", e);
                ErrorResponse::new(
                    "POOL_EXHAUSTED",
                    "Database connection pool exhausted".to_string(),
                    None,
                )
            }
            AppError::Validation(msg) => ErrorResponse::new("VALIDATION_ERROR", msg.clone(), None),
            AppError::NotFound(msg) => ErrorResponse::new("NOT_FOUND", msg.clone(), None),
            AppError::Conflict(msg) => ErrorResponse::new("CONFLICT", msg.clone(), None),
            AppError::BadRequest(msg) => ErrorResponse::new("BAD_REQUEST", msg.clone(), None),
            AppError::Unauthorized(msg) => ErrorResponse::new("UNAUTHORIZED", msg.clone(), None),
            AppError::Forbidden(msg) => ErrorResponse::new("FORBIDDEN", msg.clone(), None),
            AppError::Chain(e) => {
                warn!("Chain error: {}", e);
                ErrorResponse::new(
                    "CHAIN_ERROR",
                    "Blockchain request failed".to_string(),
                    Some(e.to_string()),
                )
            }
            AppError::ChainSubmission {
                draft_id,
                onchain_id,
                source,
            } => {
                warn!(draft_id, onchain_id = %onchain_id, "Chain submission failed: {}", source);
                ErrorResponse {
                    draft_id: Some(*draft_id),
                    onchain_id: Some(onchain_id.clone()),
                    ..ErrorResponse::new(
                        "CHAIN_SUBMISSION_FAILED",
                        "Draft saved but on-chain submission failed; resubmit to chain".to_string(),
                        Some(source.to_string()),
                    )
                }
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                ErrorResponse::new("INTERNAL_ERROR", "An internal error occurred".to_string(), None)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = self.body();
        let mut response = (self.status(), Json(body.clone())).into_response();
        // picked up by `middleware::attach_request_id`
        response.extensions_mut().insert(body);
        response
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

/// Helper function to create a validation error
pub fn validation_error(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

/// Helper function to create a not found error
pub fn not_found_error(msg: impl Into<String>) -> AppError {
    AppError::NotFound(msg.into())
}

/// Helper function to create a conflict error
pub fn conflict_error(msg: impl Into<String>) -> AppError {
    AppError::Conflict(msg.into())
}
