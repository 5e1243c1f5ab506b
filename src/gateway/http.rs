//! REST backend gateway.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::response::{
    EMAIL_PATHS, REFRESH_TOKEN_PATHS, ROLE_PATHS, TOKEN_PATHS, first_string, message,
};
use super::{AuthGateway, RefreshRequest, RefreshedToken};
use crate::auth::{AuthError, Credentials, RegisterFields, RegisterOutcome, Role, TokenGrant};
use crate::client_config::with_trailing_slash;
use crate::jwt;

pub const LOGIN_ENDPOINT: &str = "login";
pub const REGISTER_ENDPOINT: &str = "register";
pub const REFRESH_ENDPOINT: &str = "refresh";

/// Message fragments with which the backend reports a successful
/// registration, even when it picks a client-error status.
const REGISTRATION_SUCCESS_PHRASES: &[&str] = &[
    "registrado con éxito",
    "registrado con exito",
    "registrado exitosamente",
    "registered successfully",
];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody<'a> {
    identifier: &'a str,
    password: &'a str,
    remember_me: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

pub struct HttpAuthGateway {
    base: Url,
    client: reqwest::Client,
}

/// Status plus parsed body of a backend reply.
struct Reply {
    status: StatusCode,
    body: Value,
    raw: String,
}

impl HttpAuthGateway {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::NetworkError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base: with_trailing_slash(base),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base
            .join(path)
            .map_err(|e| AuthError::InvalidInput(format!("invalid endpoint {}: {}", path, e)))
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<Reply, AuthError> {
        let mut request = self.client.post(self.endpoint(path)?).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AuthError::from_transport(&e))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| AuthError::from_transport(&e))?;
        let body = serde_json::from_str(&raw).unwrap_or(Value::Null);
        debug!(endpoint = %path, status = %status, "Auth backend replied");
        Ok(Reply { status, body, raw })
    }
}

/// Build a grant from a successful login body.
fn grant_from_body(body: &Value, fallback_email: &str) -> Result<TokenGrant, AuthError> {
    let token = first_string(body, TOKEN_PATHS)
        .ok_or_else(|| AuthError::ServerError("login response did not contain a token".into()))?;

    let role = first_string(body, ROLE_PATHS)
        .and_then(|raw| Role::parse(&raw))
        .unwrap_or_else(|| jwt::extract_role(&token));
    let email = first_string(body, EMAIL_PATHS).unwrap_or_else(|| fallback_email.to_string());

    Ok(TokenGrant {
        token,
        role,
        email,
        refresh_token: first_string(body, REFRESH_TOKEN_PATHS),
    })
}

fn is_registration_success_message(text: &str) -> bool {
    let text = text.to_lowercase();
    REGISTRATION_SUCCESS_PHRASES
        .iter()
        .any(|phrase| text.contains(phrase))
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn login(&self, credentials: &Credentials) -> Result<TokenGrant, AuthError> {
        let body = LoginBody {
            identifier: credentials.email.trim(),
            password: &credentials.password,
            remember_me: credentials.remember_me,
        };
        let reply = self.post(LOGIN_ENDPOINT, &body, None).await?;

        match reply.status {
            s if s.is_success() => grant_from_body(&reply.body, credentials.email.trim()),
            StatusCode::BAD_REQUEST
            | StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::NOT_FOUND
            | StatusCode::UNPROCESSABLE_ENTITY => {
                debug!(
                    status = %reply.status,
                    message = %message(&reply.body, &reply.raw),
                    "Login rejected"
                );
                Err(AuthError::InvalidCredentials)
            }
            s => Err(AuthError::ServerError(format!(
                "{}: {}",
                s,
                message(&reply.body, &reply.raw)
            ))),
        }
    }

    async fn register(&self, fields: &RegisterFields) -> Result<RegisterOutcome, AuthError> {
        let reply = self.post(REGISTER_ENDPOINT, fields, None).await?;

        if reply.status.is_success() {
            return Ok(RegisterOutcome::Registered);
        }

        let text = message(&reply.body, &reply.raw);
        if reply.status.is_client_error() {
            if is_registration_success_message(&text) {
                warn!(
                    status = %reply.status,
                    message = %text,
                    "Registration returned a client error with a success message; accepting as success"
                );
                return Ok(RegisterOutcome::AmbiguousSuccess);
            }
            return Err(AuthError::InvalidInput(text));
        }
        Err(AuthError::ServerError(format!("{}: {}", reply.status, text)))
    }

    async fn refresh(&self, request: &RefreshRequest) -> Result<RefreshedToken, AuthError> {
        if request.is_empty() {
            return Err(AuthError::RefreshFailed("no credential to refresh".into()));
        }
        let body = RefreshBody {
            token: request.token.as_deref(),
            refresh_token: request.refresh_token.as_deref(),
        };
        let reply = self
            .post(REFRESH_ENDPOINT, &body, request.token.as_deref())
            .await?;

        if !reply.status.is_success() {
            return Err(AuthError::RefreshFailed(format!(
                "{}: {}",
                reply.status,
                message(&reply.body, &reply.raw)
            )));
        }
        let token = first_string(&reply.body, TOKEN_PATHS)
            .ok_or_else(|| AuthError::RefreshFailed("refresh response did not contain a token".into()))?;

        Ok(RefreshedToken {
            token,
            refresh_token: first_string(&reply.body, REFRESH_TOKEN_PATHS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_grant_prefers_body_role_and_email() {
        let body = json!({
            "data": { "token": "h.p.s" },
            "user": { "email": "org@x.com", "role": "Organizador" },
            "refreshToken": "r"
        });
        let grant = grant_from_body(&body, "typed@x.com").unwrap();
        assert_eq!(grant.token, "h.p.s");
        assert_eq!(grant.role, Role::Organizador);
        assert_eq!(grant.email, "org@x.com");
        assert_eq!(grant.refresh_token.as_deref(), Some("r"));
    }

    #[test]
    fn test_grant_falls_back_to_token_role_and_typed_email() {
        let token = jwt::unsigned_token(&json!({ "roles": ["admin"] }));
        let body = json!({ "token": token });
        let grant = grant_from_body(&body, "typed@x.com").unwrap();
        assert_eq!(grant.role, Role::Admin);
        assert_eq!(grant.email, "typed@x.com");
        assert_eq!(grant.refresh_token, None);
    }

    #[test]
    fn test_grant_without_token_is_server_error() {
        let body = json!({ "ok": true });
        assert!(matches!(
            grant_from_body(&body, "a@x.com"),
            Err(AuthError::ServerError(_))
        ));
    }

    #[test]
    fn test_registration_success_phrases() {
        assert!(is_registration_success_message("Usuario registrado con éxito"));
        assert!(is_registration_success_message("USUARIO REGISTRADO CON EXITO"));
        assert!(!is_registration_success_message("El correo ya existe"));
    }
}
