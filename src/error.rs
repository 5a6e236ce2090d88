/// Unified error types for the CreatorHub server
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the server
#[derive(Error, Debug)]
pub enum HubError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Authentication errors (no valid session)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors (actor lacks required role or account state)
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Validation errors (malformed or missing request fields)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Document storage errors
    #[error("Document storage error: {0}")]
    DocumentStorage(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g., duplicate account)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A privileged multi-step action could not be completed
    #[error("Action failed: {0}")]
    ActionFailed(String),

    /// Account suspended
    #[error("Account suspended: {0}")]
    AccountSuspended(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// JSON error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert HubError to HTTP response
impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            HubError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            HubError::Unauthorized(_) => {
                (StatusCode::FORBIDDEN, "Unauthorized", self.to_string())
            }
            HubError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "InvalidRequest", self.to_string())
            }
            HubError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            HubError::Conflict(_) => (StatusCode::CONFLICT, "Conflict", self.to_string()),
            HubError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimitExceeded",
                "Rate limit exceeded".to_string(),
            ),
            HubError::AccountSuspended(_) => (
                StatusCode::FORBIDDEN,
                "AccountSuspended",
                self.to_string(),
            ),
            HubError::ActionFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ActionFailed",
                self.to_string(),
            ),
            HubError::Database(_)
            | HubError::Internal(_)
            | HubError::Io(_)
            | HubError::Serialization(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                self.to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for server operations
pub type HubResult<T> = Result<T, HubError>;
