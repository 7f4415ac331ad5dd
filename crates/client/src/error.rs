//! Error taxonomy surfaced by the client runtime.
//!
//! Callers receive typed results, never panics. The taxonomy matters for
//! behavior: [`ApiError::Network`] is recoverable and never signs the user
//! out, while [`ApiError::AuthRejected`] on a refresh forces the session
//! back to anonymous.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur when talking to the Velvet backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server was unreachable (DNS, connect, timeout). Recoverable by
    /// retry; never causes sign-out.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Credentials or tokens were explicitly rejected (401/403).
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// The server rejected the request's shape or content (400/422);
    /// carries the server-provided message verbatim.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Any other non-success response.
    #[error("unexpected response ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or extracted detail message.
        message: String,
    },

    /// A response body could not be parsed.
    #[error("response parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An operation requiring an active credential was called while
    /// anonymous. No network call is made.
    #[error("not signed in")]
    NotAuthenticated,

    /// The local durable store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Whether this error is the 401/403 signal that should trigger the
    /// refresh-and-replay path.
    #[must_use]
    pub const fn is_auth_rejected(&self) -> bool {
        matches!(self, Self::AuthRejected(_))
    }

    /// A message suitable for showing to the user: the server-provided
    /// detail when available, a generic message per error kind otherwise.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Cannot reach the server. Check your connection and try again."
                .to_string(),
            Self::AuthRejected(detail) if !detail.is_empty() => detail.clone(),
            Self::AuthRejected(_) | Self::NotAuthenticated => {
                "Please sign in to continue.".to_string()
            }
            Self::Validation(detail) if !detail.is_empty() => detail.clone(),
            Self::Validation(_) => "The server rejected the request.".to_string(),
            Self::Api { .. } | Self::Parse(_) | Self::Storage(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_server_detail() {
        let err = ApiError::Validation("quantity must be positive".to_string());
        assert_eq!(err.user_message(), "quantity must be positive");

        let err = ApiError::AuthRejected("Incorrect email or password".to_string());
        assert_eq!(err.user_message(), "Incorrect email or password");
    }

    #[test]
    fn test_user_message_falls_back_to_generic() {
        let err = ApiError::AuthRejected(String::new());
        assert_eq!(err.user_message(), "Please sign in to continue.");

        let err = ApiError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
    }

    #[test]
    fn test_is_auth_rejected() {
        assert!(ApiError::AuthRejected("nope".to_string()).is_auth_rejected());
        assert!(!ApiError::NotAuthenticated.is_auth_rejected());
    }
}
