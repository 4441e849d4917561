//! Application Error Types
//!
//! Centralized error taxonomy with Axum integration and wire-event rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Access denied: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server configuration error: {0}")]
    ServerConfiguration(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable error kind, used as the `type` field of wire errors.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Authentication(_) => "authentication_error",
            AppError::Authorization(_) => "authorization_error",
            AppError::Validation(_) => "validation_error",
            AppError::RateLimited(_) => "rate_limit_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::ServerConfiguration(_) => "server_configuration_error",
            AppError::Database(_) | AppError::Internal(_) => "internal_error",
        }
    }

    /// Numeric error code, stable across transports.
    pub fn code(&self) -> u16 {
        match self {
            AppError::Authentication(_) => 10003,
            AppError::Authorization(_) => 10004,
            AppError::Validation(_) => 10007,
            AppError::RateLimited(_) => 10006,
            AppError::NotFound(_) => 10001,
            AppError::ServerConfiguration(_) => 10008,
            AppError::Database(_) | AppError::Internal(_) => 10000,
        }
    }

    /// HTTP status equivalent.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServerConfiguration(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error must terminate the connection that raised it.
    ///
    /// Authentication and session failures close the socket; everything else
    /// is surfaced as an `error` event and the connection stays up.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Authentication(_) | AppError::ServerConfiguration(_)
        )
    }

    /// Message safe to show to a client.
    ///
    /// Unexpected errors are logged server-side and replaced with a generic
    /// message; anything resembling a storage-layer detail is stripped so
    /// persistence internals never reach the client.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                GENERIC_ERROR_MESSAGE.to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                GENERIC_ERROR_MESSAGE.to_string()
            }
            AppError::ServerConfiguration(msg) => {
                tracing::error!(error = %msg, "Server configuration error");
                "Server configuration error".to_string()
            }
            other => sanitize_client_message(&other.to_string()),
        }
    }
}

/// Fallback message for errors the client has no business inspecting.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Strip messages that leak storage or runtime internals.
///
/// Validation and authorization messages are authored by this crate and are
/// safe, but errors wrapped from lower layers can smuggle connection strings
/// or SQL fragments through the `Display` impl.
fn sanitize_client_message(message: &str) -> String {
    const LEAKY_FRAGMENTS: &[&str] = &[
        "sql", "database", "postgres", "connection", "pool", "constraint",
        "relation", "column", "syntax", "deadlock", "timed out",
    ];

    let lowered = message.to_lowercase();
    if LEAKY_FRAGMENTS.iter().any(|f| lowered.contains(f)) {
        tracing::warn!(original = %message, "Stripped internal detail from client error");
        return GENERIC_ERROR_MESSAGE.to_string();
    }
    message.to_string()
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.code(),
            message: self.client_message(),
            error_type: self.kind(),
        };

        (self.status(), Json(body)).into_response()
    }
}
