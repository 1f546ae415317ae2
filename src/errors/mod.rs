//! Error handling module for the standards backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.
//! Messages are the French texts shown to the user in the alert dialog.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const INVALID_ACCESS_CODE: &str = "INVALID_ACCESS_CODE";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const CONFIRMATION_REQUIRED: &str = "CONFIRMATION_REQUIRED";
    pub const PHOTO_LIMIT: &str = "PHOTO_LIMIT";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const UPLOAD_ERROR: &str = "UPLOAD_ERROR";
    pub const IMPORT_ERROR: &str = "IMPORT_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Access code missing or not in the code table
    InvalidAccessCode(String),
    /// Identity is not allowed to perform the action
    Forbidden(String),
    /// Task not found
    NotFound(String),
    /// Validation error
    Validation(String),
    /// Destructive or fan-out action sent without explicit confirmation
    ConfirmationRequired {
        prompt: String,
        store_count: Option<usize>,
    },
    /// Compliance photo list already full
    PhotoLimit(String),
    /// Task store operation failed
    Store(String),
    /// Photo compression, encoding or hosting failed
    Upload(String),
    /// Spreadsheet parsing or row import failed
    Import {
        message: String,
        imported: usize,
    },
    /// Internal server error
    Internal(String),
    /// Bad request
    BadRequest(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidAccessCode(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::ConfirmationRequired { .. } => StatusCode::PRECONDITION_REQUIRED,
            AppError::PhotoLimit(_) => StatusCode::CONFLICT,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upload(_) => StatusCode::BAD_GATEWAY,
            AppError::Import { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidAccessCode(_) => codes::INVALID_ACCESS_CODE,
            AppError::Forbidden(_) => codes::FORBIDDEN,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::ConfirmationRequired { .. } => codes::CONFIRMATION_REQUIRED,
            AppError::PhotoLimit(_) => codes::PHOTO_LIMIT,
            AppError::Store(_) => codes::DATABASE_ERROR,
            AppError::Upload(_) => codes::UPLOAD_ERROR,
            AppError::Import { .. } => codes::IMPORT_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::InvalidAccessCode(msg) => msg.clone(),
            AppError::Forbidden(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::ConfirmationRequired { prompt, .. } => prompt.clone(),
            AppError::PhotoLimit(msg) => msg.clone(),
            AppError::Store(msg) => msg.clone(),
            AppError::Upload(msg) => msg.clone(),
            AppError::Import { message, .. } => message.clone(),
            AppError::Internal(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
        }
    }

    /// Replace the message of a store failure with the alert text of the action that failed.
    pub fn for_action(self, alert: &str) -> Self {
        match self {
            AppError::Store(detail) => {
                tracing::error!("{}: {}", alert, detail);
                AppError::Store(alert.to_string())
            }
            other => other,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Store(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("Image host error: {:?}", err);
        AppError::Upload(format!("Erreur lors de l'envoi de la photo: {}", err))
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        tracing::error!("Image processing error: {:?}", err);
        AppError::Upload(format!("Erreur lors de la compression de la photo: {}", err))
    }
}

impl From<calamine::XlsxError> for AppError {
    fn from(err: calamine::XlsxError) -> Self {
        tracing::error!("Spreadsheet read error: {:?}", err);
        AppError::Import {
            message: "Erreur lors de l'import du fichier Excel".to_string(),
            imported: 0,
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for AppError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        tracing::error!("Spreadsheet write error: {:?}", err);
        AppError::Internal("Erreur lors de l'export Excel".to_string())
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
    pub revision_id: i64,
}

impl ErrorResponse {
    pub fn new(error: &AppError, revision_id: i64) -> Self {
        let details = match error {
            AppError::ConfirmationRequired {
                store_count: Some(count),
                ..
            } => Some(serde_json::json!({ "storeCount": count })),
            AppError::Import { imported, .. } => Some(serde_json::json!({ "imported": imported })),
            _ => None,
        };

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
                details,
            },
            revision_id,
        }
    }
}

/// Wrapper type for errors that carry revision_id context.
pub struct AppErrorWithRevision {
    pub error: AppError,
    pub revision_id: i64,
}

impl IntoResponse for AppErrorWithRevision {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = ErrorResponse::new(&self.error, self.revision_id);
        (status, Json(body)).into_response()
    }
}
