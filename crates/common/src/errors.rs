//! Common error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Detailed validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationError>>,
    /// ISO 8601 timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_details(mut self, details: Vec<ValidationError>) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "BAD_REQUEST" | "VALIDATION" => StatusCode::BAD_REQUEST,
            "NOT_FOUND" | "REFERENTIAL" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "UNPROCESSABLE_ENTITY" => StatusCode::UNPROCESSABLE_ENTITY,
            "DEADLOCK_EXHAUSTED" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

/// Validation error detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// Application-wide error type. Variants map onto the error-kind table
/// in the error handling design (§7): Validation, Referential, Conflict,
/// Deadlock, and data-model invariant violations, plus the generic
/// request-handling kinds the read API needs.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unprocessable entity: {0}")]
    UnprocessableEntity(String),

    /// Dropped field during normalisation; carries the field name and
    /// the reason it failed validation. Never fails the listing — this
    /// variant exists so callers can surface it as a counter/log line.
    #[error("validation failed for field {field}: {reason}")]
    Validation { field: String, reason: String },

    /// A referenced primary id does not exist, and — if discoverable
    /// from merge history — the id that absorbed it.
    #[error("referential error: id {missing_id} not found{}", .absorbed_by.map(|id| format!(" (absorbed by {id})")).unwrap_or_default())]
    Referential {
        missing_id: i64,
        absorbed_by: Option<i64>,
    },

    /// A listing upsert raced another write for the same
    /// (source_site, site_property_id) key.
    #[error("listing conflict for site_property_id {site_property_id}")]
    ListingConflict { site_property_id: String },

    /// Retry budget for a deadlocking transaction was exhausted.
    #[error("deadlock retry budget exhausted after {attempts} attempts")]
    DeadlockExhausted { attempts: u32 },

    /// A data-model invariant (§3) was found violated and could not be
    /// self-healed inline.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) | AppError::ListingConflict { .. } => "CONFLICT",
            AppError::UnprocessableEntity(_) => "UNPROCESSABLE_ENTITY",
            AppError::Validation { .. } => "VALIDATION",
            AppError::Referential { .. } => "REFERENTIAL",
            AppError::DeadlockExhausted { .. } => "DEADLOCK_EXHAUSTED",
            AppError::InvariantViolation(_) => "INVARIANT_VIOLATION",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.code(), self.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::Database(_) | AppError::Internal(_)) {
            tracing::error!(error = %self, "unhandled core error");
        }
        self.to_response().into_response()
    }
}
