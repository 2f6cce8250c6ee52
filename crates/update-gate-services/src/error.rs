//! Error types for update-gate-services

use thiserror::Error;

/// Errors that can occur talking to an external service
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Transport failure or unexpected response; retryable
    #[error("{service} is unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },

    /// The service answered, and the requested object does not exist
    #[error("{what} not found")]
    NotFound { what: String },

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    pub fn unavailable(service: &'static str, err: impl std::fmt::Display) -> Self {
        ServiceError::Unavailable {
            service,
            message: err.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound { .. })
    }
}
