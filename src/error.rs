//! Error handling module
//!
//! Provides unified error types and handling for the entire application.
//! Every failure reaching a client goes through `IntoResponse for AppError`;
//! handlers never build error bodies themselves.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tokio_postgres::error::SqlState;
use tracing::{error, warn};

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        let Some(code) = e.code() else {
            return AppError::Database(e);
        };

        let detail = e
            .as_db_error()
            .map(|db| {
                format!(
                    "{} (constraint: {})",
                    db.message(),
                    db.constraint().unwrap_or("unknown")
                )
            })
            .unwrap_or_else(|| e.to_string());

        if *code == SqlState::UNIQUE_VIOLATION {
            warn!(detail = %detail, "Unique constraint violated");
            AppError::Conflict("A record with that value already exists".to_string())
        } else if *code == SqlState::FOREIGN_KEY_VIOLATION {
            warn!(detail = %detail, "Foreign key constraint violated");
            AppError::Conflict("The record is still referenced by related data".to_string())
        } else {
            AppError::Database(e)
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl AppError {
    /// HTTP status the error is rendered with
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) | AppError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, message, details) = match &self {
            AppError::Database(e) => {
                error!("Database error: {:?}", e);
                (
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    None,
                )
            }
            AppError::Pool(e) => {
                error!("Pool error: {:?}", e);
                (
                    "POOL_EXHAUSTED",
                    "Database connection pool exhausted".to_string(),
                    None,
                )
            }
            AppError::Validation(msg) => ("VALIDATION_ERROR", msg.clone(), None),
            AppError::Unauthorized(msg) => ("UNAUTHORIZED", msg.clone(), None),
            AppError::Forbidden(msg) => ("FORBIDDEN", msg.clone(), None),
            AppError::NotFound(msg) => ("NOT_FOUND", msg.clone(), None),
            AppError::Conflict(msg) => ("CONFLICT", msg.clone(), None),
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            AppError::Config(msg) => {
                error!("Configuration error: {}", msg);
                (
                    "CONFIG_ERROR",
                    "A configuration error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            error: details,
            code: Some(error_code.to_string()),
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;
