//! Error types for the reservation server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Forbidden = 1,
    DbFailure = 2,
    NotFound = 3,
    Conflict = 4,
    BadValue = 5,
    ProviderFailure = 6,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Identity provider error: {0}")]
    Provider(String),
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    /// HTTP status this error maps to
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match &self {
            AppError::Forbidden(msg) => (ErrorCode::Forbidden, msg.clone()),
            AppError::NotFound(msg) => (ErrorCode::NotFound, msg.clone()),
            AppError::Validation(msg) => (ErrorCode::BadValue, msg.clone()),
            AppError::Conflict(msg) => (ErrorCode::Conflict, msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (ErrorCode::DbFailure, "Database error".to_string())
            }
            // Provider detail stays in the logs
            AppError::Provider(msg) => {
                tracing::error!("Identity provider error: {}", msg);
                (ErrorCode::ProviderFailure, "Internal server error".to_string())
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
