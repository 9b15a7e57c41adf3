//! Error types for warehouse sessions

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors raised at the warehouse boundary
#[derive(Debug, Error)]
pub enum SessionError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// A local file could not be read for upload
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Session settings are unusable
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    /// The warehouse refused a statement
    #[error("Statement rejected: {reason}")]
    Rejected {
        /// Rendered statement text
        statement: String,
        reason: String,
    },
}

impl SessionError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn rejected(statement: impl ToString, reason: impl Into<String>) -> Self {
        Self::Rejected {
            statement: statement.to_string(),
            reason: reason.into(),
        }
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }
}
