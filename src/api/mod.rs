//! Authorized API client.
//!
//! Every request carries the token currently in the session store, read
//! fresh each time. A 401 triggers at most one refresh across all
//! concurrent requests; the failed request is then replayed once with the
//! new token. 403 and transport failures are returned as they are.

mod error;
mod refresh;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

pub use error::RequestError;
pub use refresh::{RefreshFailure, RefreshGate, RefreshResult};

use crate::auth::{AuthError, SessionController};
use crate::client_config::with_trailing_slash;
use crate::gateway::{LOGIN_ENDPOINT, REFRESH_ENDPOINT};
use crate::guard::RouteTable;
use crate::navigation::Navigator;
use crate::store::SessionStore;

/// An API call, independent of any HTTP client so it can be replayed.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base, e.g. "eventos/3"
    pub path: String,
    pub body: Option<Value>,
    /// Already replayed after a refresh; a 401 on it is final.
    pub retry: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            body: None,
            retry: false,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str, body: Value) -> Self {
        Self::new(Method::POST, path).json(body)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn mark_retry(mut self) -> Self {
        self.retry = true;
        self
    }

    fn endpoint(&self) -> &str {
        let path = self.path.trim_start_matches('/');
        path.split(['?', '#']).next().unwrap_or(path)
    }

    /// Auth endpoints answer 401 for bad credentials, not stale tokens.
    fn is_auth_endpoint(&self) -> bool {
        matches!(self.endpoint(), LOGIN_ENDPOINT | REFRESH_ENDPOINT)
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// Parsed JSON body, `Value::Null` when the body is not JSON
    pub body: Value,
    pub text: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

pub struct ApiClient {
    base: Url,
    http: reqwest::Client,
    store: Arc<dyn SessionStore>,
    controller: Arc<SessionController>,
    navigator: Arc<dyn Navigator>,
    routes: RouteTable,
    gate: RefreshGate,
}

impl ApiClient {
    pub fn new(
        base: Url,
        timeout: std::time::Duration,
        store: Arc<dyn SessionStore>,
        controller: Arc<SessionController>,
        navigator: Arc<dyn Navigator>,
        routes: RouteTable,
    ) -> Result<Self, RequestError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base: with_trailing_slash(base),
            http,
            store,
            controller,
            navigator,
            routes,
            gate: RefreshGate::new(),
        })
    }

    /// Send a request with the current token, refreshing once on 401.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, RequestError> {
        let token = self.store.token().await?;
        let response = self.execute(&request, token.as_deref()).await?;

        if response.status != StatusCode::UNAUTHORIZED || request.retry || request.is_auth_endpoint()
        {
            return Ok(response);
        }

        debug!(path = %request.path, "Request unauthorized, refreshing token");
        let new_token = self.refresh(token).await?;
        self.execute(&request.mark_retry(), Some(&new_token)).await
    }

    async fn execute(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<ApiResponse, RequestError> {
        let url = self
            .base
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| RequestError::InvalidRequest(format!("{}: {}", request.path, e)))?;

        let mut builder = self.http.request(request.method.clone(), url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RequestError::from_transport(&e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RequestError::from_transport(&e))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Ok(ApiResponse { status, body, text })
    }

    /// Join or lead the single in-flight refresh.
    async fn refresh(&self, used_token: Option<String>) -> Result<String, RequestError> {
        let controller = &self.controller;
        let result = self
            .gate
            .run(|| async move {
                match controller.refresh_session(used_token.as_deref()).await {
                    Ok(token) => Ok(token),
                    Err(AuthError::NetworkError(e)) => Err(RefreshFailure::Network(e)),
                    Err(e) => Err(RefreshFailure::Expired(e.to_string())),
                }
            })
            .await;

        match result {
            Ok(token) => Ok(token),
            Err(RefreshFailure::Network(e)) => Err(RequestError::Network(e)),
            Err(RefreshFailure::Expired(reason)) => {
                debug!(reason = %reason, "Refresh failed");
                self.redirect_to_login();
                Err(RequestError::SessionExpired)
            }
        }
    }

    fn redirect_to_login(&self) {
        let current = self.navigator.current_path();
        if !self.routes.is_login(&current) {
            info!(from = %current, "Session expired, redirecting to login");
            self.navigator.navigate(self.routes.login_path());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_endpoints_detected() {
        assert!(ApiRequest::get("/login").is_auth_endpoint());
        assert!(ApiRequest::get("login?next=/admin").is_auth_endpoint());
        assert!(ApiRequest::get("refresh").is_auth_endpoint());
        assert!(!ApiRequest::get("/eventos").is_auth_endpoint());
        assert!(!ApiRequest::get("/login/history").is_auth_endpoint());
    }

    #[test]
    fn test_mark_retry() {
        let request = ApiRequest::post("inscripciones", serde_json::json!({ "evento": 3 }));
        assert!(!request.retry);
        assert!(request.mark_retry().retry);
    }
}
