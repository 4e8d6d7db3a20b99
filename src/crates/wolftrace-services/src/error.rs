//! Error types for service client implementations.

use thiserror::Error;

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors that can occur when calling external services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to serialize/deserialize data.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// API key not found in the environment.
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// The service answered with an unexpected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The service answered with an error status.
    #[error("service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// Request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Http(err) => err.is_timeout() || err.is_connect(),
            ServiceError::Timeout(_) => true,
            ServiceError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Serialization(err.to_string())
    }
}

/// Service failures surface to the engine as its `Service` error class.
impl From<ServiceError> for wolftrace_core::CoreError {
    fn from(err: ServiceError) -> Self {
        wolftrace_core::CoreError::Service(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ServiceError::Timeout("t".into()).is_retryable());
        assert!(ServiceError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(ServiceError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(!ServiceError::Status { status: 404, body: String::new() }.is_retryable());
        assert!(!ServiceError::ApiKeyNotFound("KEY".into()).is_retryable());
        assert!(!ServiceError::InvalidResponse("shape".into()).is_retryable());
    }
}
