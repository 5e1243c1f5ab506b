//! Auth gateway: the network side of authentication.
//!
//! One capability, two implementations. `HttpAuthGateway` talks to the REST
//! backend; `MockAuthGateway` keeps a fixed user list in memory. The choice
//! is made once, at composition time, by [`build_gateway`].

mod http;
mod mock;
pub mod response;

use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::{AuthError, Credentials, RegisterFields, RegisterOutcome, TokenGrant};
use crate::client_config::ClientConfig;

pub use http::{HttpAuthGateway, LOGIN_ENDPOINT, REFRESH_ENDPOINT, REGISTER_ENDPOINT};
pub use mock::{MockAuthGateway, MockUser};

/// Credential handed to the refresh endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    /// The access token currently held, possibly expired
    pub token: Option<String>,
    pub refresh_token: Option<String>,
}

impl RefreshRequest {
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.refresh_token.is_none()
    }
}

/// Token material returned by a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub token: String,
    /// Replacement refresh token, if the backend rotates them
    pub refresh_token: Option<String>,
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Exchange credentials for a normalized token grant.
    async fn login(&self, credentials: &Credentials) -> Result<TokenGrant, AuthError>;

    /// Create an account. Does not issue a session.
    async fn register(&self, fields: &RegisterFields) -> Result<RegisterOutcome, AuthError>;

    /// Mint a new token. Any failure is `AuthError::RefreshFailed`.
    async fn refresh(&self, request: &RefreshRequest) -> Result<RefreshedToken, AuthError>;

    /// Drop gateway-held credential state. Completes locally; no network
    /// confirmation is required.
    async fn logout(&self) {}
}

/// Select the gateway implementation named by the configuration.
pub fn build_gateway(config: &ClientConfig) -> Result<Arc<dyn AuthGateway>, AuthError> {
    if config.mock {
        tracing::info!("Using mock auth gateway");
        Ok(Arc::new(MockAuthGateway::seeded(config.mock_latency)))
    } else {
        tracing::info!(api = %config.api_base, "Using HTTP auth gateway");
        Ok(Arc::new(HttpAuthGateway::new(
            config.api_base.clone(),
            config.request_timeout,
        )?))
    }
}
