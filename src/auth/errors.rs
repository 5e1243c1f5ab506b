//! Authentication error types.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the auth gateway and the session controller.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Login rejected by the backend. Never retried automatically.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// No response or timeout. Session state is untouched.
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Backend-side failure. Session state is untouched.
    #[error("Server error: {0}")]
    ServerError(String),
    /// Token could not be decoded; treated as no valid session.
    #[error("Malformed token")]
    MalformedToken,
    /// Refresh attempt failed; fatal for the current session.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),
    /// Input rejected locally or by the backend with a client error.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// A logout happened while the operation was in flight.
    #[error("Superseded by a later logout")]
    Superseded,
    #[error("Session storage error: {0}")]
    Storage(#[from] StoreError),
}

impl AuthError {
    /// Map a transport error. Timeouts count as network errors, never as
    /// authorization failures.
    pub fn from_transport(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            AuthError::NetworkError("request timed out".into())
        } else {
            AuthError::NetworkError(e.to_string())
        }
    }

    /// Whether the UI should offer a retry for this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::NetworkError(_) | AuthError::ServerError(_))
    }
}

/// Token decoding error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(&'static str),
}

impl From<TokenError> for AuthError {
    fn from(_: TokenError) -> Self {
        AuthError::MalformedToken
    }
}
