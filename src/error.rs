//! Store error types with HTTP status code mapping.
//!
//! [`StoreError`] is the single error type returned by the record model,
//! every storage backend, the service layer and the HTTP/WebSocket
//! boundaries. Each variant maps to a numeric code and an HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::RecordId;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid payload: payload must not be null",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Errors raised while building, appending or reading event records.
///
/// # Error Code Ranges
///
/// | Range     | Category    | HTTP Status                 |
/// |-----------|-------------|-----------------------------|
/// | 1000–1999 | Validation  | 400 Bad Request             |
/// | 2000–2999 | Not Found   | 404 Not Found               |
/// | 3000–3999 | Storage     | 500 / 503                   |
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The payload is empty, not a structured document, or cannot be
    /// serialized. Always a caller bug.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Query bounds are malformed (`from` is after `to`).
    #[error("invalid time range: from {from} is after to {to}")]
    InvalidRange {
        /// Lower bound supplied by the caller.
        from: DateTime<Utc>,
        /// Upper bound supplied by the caller.
        to: DateTime<Utc>,
    },

    /// No record was ever assigned this identifier, or it was removed
    /// administratively.
    #[error("event record not found: {0}")]
    NotFound(RecordId),

    /// The durable medium could not be reached or did not answer in time.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A stored row could not be turned back into a record.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidPayload(_) => 1001,
            Self::InvalidRange { .. } => 1002,
            Self::NotFound(_) => 2001,
            Self::StorageUnavailable(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPayload(_) | Self::InvalidRange { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` when retrying with backoff may succeed.
    ///
    /// Only safe to act on blindly for queries: a retried append may write
    /// the same logical event twice.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // invalid_text_representation, untranslatable_character,
                // invalid_json_text, not_null_violation
                Some("22P02" | "22P05" | "22032" | "23502") => {
                    Self::InvalidPayload(db_err.message().to_string())
                }
                _ => Self::StorageUnavailable(db_err.to_string()),
            },
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::TypeNotFound { .. } => Self::Internal(err.to_string()),
            other => Self::StorageUnavailable(other.to_string()),
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
