//! Error handling for WasherCheck
//!
//! Centralized error types and handling for the application.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::io::FetchError;
use crate::models::notification::NotificationError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("Machine status fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Fetch(FetchError::Status { status: 404, .. }) => StatusCode::NOT_FOUND,
            AppError::Fetch(_) => StatusCode::BAD_GATEWAY,
            AppError::Notification(NotificationError::NotFound(_)) | AppError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::Notification(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Storage(_) => "DatabaseError",
            AppError::Fetch(_) => "MachineSourceError",
            AppError::Notification(NotificationError::NotFound(_)) => "NotificationNotFound",
            AppError::Notification(_) => "InvalidNotification",
            AppError::NotFound(_) => "NotFound",
            AppError::BadRequest(_) => "BadRequest",
        }
    }

    /// Check if this error should be logged as an error vs warning
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    pub fn not_found(resource: &str) -> Self {
        AppError::NotFound(format!("{resource} not found"))
    }

    pub fn bad_request(message: &str) -> Self {
        AppError::BadRequest(message.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();
        let timestamp = chrono::Utc::now().timestamp();

        if self.is_server_error() {
            tracing::error!(error = %message, code = error_code, "Request failed");
        } else {
            tracing::debug!(error = %message, code = error_code, "Request rejected");
        }

        let body = Json(json!({
            "error": error_code,
            "message": message,
            "timestamp": timestamp
        }));

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
