// ============================
// taskvault-backend/src/error.rs
// ============================
//! Central error type + Axum integration.
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Field name → first validation message for that field.
pub type FieldErrors = BTreeMap<String, String>;

/// Result alias used by handlers and storage.
pub type AppResult<T> = Result<T, AppError>;

static DETAILED_MESSAGES: AtomicBool = AtomicBool::new(false);

/// Switches error bodies between detailed and sanitized messages.
/// Sanitized until the application state enables detail outside production.
pub fn set_detailed_messages(enabled: bool) {
    DETAILED_MESSAGES.store(enabled, Ordering::Relaxed);
}

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Edit conflict on {entity} {id}: the record was modified or deleted")]
    EditConflict { entity: &'static str, id: i64 },

    #[error("Activation code has expired")]
    ActivationCodeExpired,

    #[error("Invalid activation code")]
    ActivationCodeMismatch,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_)
            | AppError::EditConflict { .. }
            | AppError::ActivationCodeExpired
            | AppError::ActivationCodeMismatch => StatusCode::CONFLICT,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidInput(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "AUTH_001",
            AppError::Forbidden(_) => "AUTH_002",
            AppError::NotFound(_) => "NF_001",
            AppError::Conflict(_) => "CONFLICT_001",
            AppError::EditConflict { .. } => "EDIT_001",
            AppError::ActivationCodeExpired => "ACT_001",
            AppError::ActivationCodeMismatch => "ACT_002",
            AppError::RateLimitExceeded => "RATE_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::Validation(_) => "VAL_002",
            AppError::Timeout(_) => "TIMEOUT_001",
            AppError::Internal(_) => "INT_001",
            AppError::Database(_) => "DB_001",
        }
    }

    /// Message placed in the response body.
    pub fn public_message(&self, detailed: bool) -> String {
        if detailed {
            self.to_string()
        } else {
            self.sanitized_message()
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Unauthorized(_) => "Authentication failed".to_string(),
            AppError::Forbidden(msg) | AppError::NotFound(msg) | AppError::Conflict(msg) => {
                msg.clone()
            },
            AppError::EditConflict { .. } => {
                "Unable to update the record due to an edit conflict, please refetch and try again"
                    .to_string()
            },
            AppError::ActivationCodeExpired => {
                "Activation code has expired, request a new one".to_string()
            },
            AppError::ActivationCodeMismatch => "Invalid activation code".to_string(),
            AppError::RateLimitExceeded => {
                "Rate limit exceeded, please try again later".to_string()
            },
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::Validation(_) => "Invalid input provided".to_string(),
            AppError::Timeout(_) => "The service is busy, please try again later".to_string(),
            AppError::Internal(_) | AppError::Database(_) => {
                "An internal server error occurred".to_string()
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        let message = self.public_message(DETAILED_MESSAGES.load(Ordering::Relaxed));

        let mut error = serde_json::json!({
            "code": error_code,
            "message": message,
        });
        if let AppError::Validation(fields) = &self {
            error["fields"] = serde_json::json!(fields);
        }

        (status, axum::Json(serde_json::json!({ "error": error }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        AppError::InvalidInput("route parameter {id} must be a positive integer".to_string())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("background job failed: {err}"))
    }
}
