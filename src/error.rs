//! # Error Handling
//!
//! Error types for the HTTP surface and how they become responses.
//!
//! ## Key Rust Concepts for Error Handling:
//! - **Enums for error types**: each variant is one kind of failure
//! - **From trait**: lets `?` convert library errors into `AppError`
//! - **ResponseError trait**: actix-web turns the error into an HTTP response
//!
//! The WebSocket path does not use `AppError`: failures there are logged
//! and, where the client should know, surfaced as `log` envelopes.

use actix::MailboxError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Failures an HTTP handler can report.
///
/// ## Usage Example:
/// ```ignore
/// let trips = state.trips.send(GetTrips).await?; // MailboxError -> Unavailable
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Anything unexpected on the server side (500)
    Internal(String),

    /// A component the request depends on is not running (503)
    Unavailable(String),

    /// No route matches the request path (404)
    NotFound(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::Unavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

/// Converts errors into JSON responses of the form:
/// ```json
/// {"error": {"type": "unavailable", "message": "...", "timestamp": "2025-01-01T12:00:00Z"}}
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (error_type, message) = match self {
            AppError::Internal(msg) => ("internal_error", msg),
            AppError::Unavailable(msg) => ("unavailable", msg),
            AppError::NotFound(msg) => ("not_found", msg),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

/// `?` on a failed actor request. The only actor handlers talk to is the
/// trip hub, and a mailbox error means it has stopped.
impl From<MailboxError> for AppError {
    fn from(err: MailboxError) -> Self {
        AppError::Unavailable(format!("trip hub: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{:#}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;
