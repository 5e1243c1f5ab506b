//! Errors returned by the authorized API client.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum RequestError {
    /// No response, or the request timed out. Never triggers refresh.
    #[error("Network error: {0}")]
    Network(String),
    /// The session could not be refreshed and has been ended.
    #[error("Session expired")]
    SessionExpired,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Session storage error: {0}")]
    Storage(#[from] StoreError),
}

impl RequestError {
    pub fn from_transport(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            RequestError::Network("request timed out".into())
        } else {
            RequestError::Network(e.to_string())
        }
    }
}
