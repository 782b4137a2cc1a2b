//! Error types for notepaper-core

use thiserror::Error;

use crate::auth::AuthError;

/// Result type alias using notepaper-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in notepaper-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Authentication failed or the session could not be restored
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Transport-level HTTP failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote store rejected the request (policy denial, bad filter, ...)
    #[error("Remote store error: {message} ({status})")]
    Api { status: u16, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Note not found
    #[error("Note not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No signed-in session is available
    #[error("Not signed in")]
    Unauthenticated,

    /// Client configuration is missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether retrying the same operation later may succeed.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        let error = Error::Api {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(error.is_retryable());
    }

    #[test]
    fn policy_denials_are_not_retryable() {
        let error = Error::Api {
            status: 403,
            message: "permission denied for table notes".to_string(),
        };
        assert!(!error.is_retryable());
        assert!(!Error::Unauthenticated.is_retryable());
    }
}
