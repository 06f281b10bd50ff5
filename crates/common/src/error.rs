//! Error types for the AzureRM client

use thiserror::Error;

/// Result type alias using the AzureRM Error
pub type Result<T> = std::result::Result<T, Error>;

/// AzureRM client error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("API error (status {status}): {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid resource id: {0}")]
    InvalidResourceId(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Long-running operation finished with status {status}: {message}")]
    OperationFailed { status: String, message: String },

    #[error("Operation timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the remote side reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::Api { status: 404, .. }
        )
    }

    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(Error::not_found("Route Table", "rt1").is_not_found());
        assert!(Error::Api {
            status: 404,
            code: "ResourceNotFound".into(),
            message: "gone".into(),
        }
        .is_not_found());
        assert!(!Error::Api {
            status: 409,
            code: "Conflict".into(),
            message: "busy".into(),
        }
        .is_not_found());
        assert!(!Error::Timeout { seconds: 5 }.is_not_found());
    }

    #[test]
    fn test_api_error_display() {
        let err = Error::Api {
            status: 400,
            code: "InvalidParameter".into(),
            message: "bad tier".into(),
        };
        assert_eq!(
            err.to_string(),
            "API error (status 400): InvalidParameter: bad tier"
        );
    }
}
