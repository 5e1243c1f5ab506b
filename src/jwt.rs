//! Bearer token decoding and (for the mock backend) token signing.
//!
//! Decoding is client side: the payload segment is read without checking the
//! signature, which only the issuing backend can verify. `JwtConfig` signs
//! HS256 tokens so the in-memory gateway hands out realistic credentials.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::{Role, TokenError};

/// Claims read from a token payload. Unknown claims are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    pub sub: Option<String>,
    pub email: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: Option<u64>,
    /// Issued at (Unix timestamp)
    pub iat: Option<u64>,
    /// Raw role claim, first match of `role`, `rol`, `roles[0]`
    pub role: Option<String>,
}

/// Role claim keys in lookup order. A list value contributes its first element.
const ROLE_CLAIMS: &[&str] = &["role", "rol", "roles"];

/// Current Unix time in seconds.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Decode the payload segment of a `header.payload.signature` token.
pub fn decode(token: &str) -> Result<Claims, TokenError> {
    let mut parts = token.trim().split('.');
    let (Some(header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed("expected three segments"));
    };
    if header.is_empty() || payload.is_empty() {
        return Err(TokenError::Malformed("empty segment"));
    }

    // Some issuers keep the padding; the URL-safe alphabet is the same.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| TokenError::Malformed("payload is not base64url"))?;
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed("payload is not JSON"))?;
    let Value::Object(map) = value else {
        return Err(TokenError::Malformed("payload is not an object"));
    };

    Ok(Claims {
        sub: string_claim(&map, "sub"),
        email: string_claim(&map, "email"),
        exp: timestamp_claim(&map, "exp"),
        iat: timestamp_claim(&map, "iat"),
        role: role_claim(&map),
    })
}

/// Whether the token's `exp` claim is at or before `now`.
///
/// Tokens without an `exp` claim never expire here; the session window in
/// the controller is the only limit on those. Malformed tokens are not
/// expired by this function; use [`is_expired_or_malformed`] when a
/// yes/no answer about usability is needed.
pub fn is_expired(token: &str, now: u64) -> bool {
    match decode(token) {
        Ok(claims) => claims.exp.is_some_and(|exp| exp <= now),
        Err(_) => false,
    }
}

/// Whether the token is unusable: undecodable or expired.
pub fn is_expired_or_malformed(token: &str, now: u64) -> bool {
    match decode(token) {
        Ok(claims) => claims.exp.is_some_and(|exp| exp <= now),
        Err(_) => true,
    }
}

/// Read the role claim and normalize it. Absent, unknown or undecodable
/// claims resolve to the lowest-privilege role.
pub fn extract_role(token: &str) -> Role {
    decode(token)
        .ok()
        .and_then(|claims| claims.role)
        .map(|raw| {
            Role::parse(&raw).unwrap_or_else(|| {
                tracing::debug!(role = %raw, "Unrecognized role claim, using default");
                Role::default()
            })
        })
        .unwrap_or_default()
}

/// Role claim if the token carries one that names a known role.
pub fn explicit_role(token: &str) -> Option<Role> {
    decode(token)
        .ok()
        .and_then(|claims| claims.role)
        .and_then(|raw| Role::parse(&raw))
}

fn string_claim(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn timestamp_claim(map: &Map<String, Value>, key: &str) -> Option<u64> {
    let value = map.get(key)?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn role_claim(map: &Map<String, Value>) -> Option<String> {
    ROLE_CLAIMS.iter().find_map(|key| match map.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => items
            .first()
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
        _ => None,
    })
}

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims signed into mock access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iat: u64,
    pub exp: u64,
}

/// Claims signed into mock refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// JWT ID, unique per refresh token
    pub jti: String,
    pub sub: String,
    pub email: String,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iat: u64,
    pub exp: u64,
}

/// Access token duration: 1 hour
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 60 * 60;

/// Refresh token duration: 2 weeks
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 14 * 24 * 60 * 60;

/// HS256 signing keys for the mock backend.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

/// Errors that can occur while signing or verifying tokens.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("Failed to decode token: {0}")]
    Decoding(jsonwebtoken::errors::Error),
    #[error("Wrong token type")]
    WrongTokenType,
}

impl JwtConfig {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Sign an access token valid for [`ACCESS_TOKEN_DURATION_SECS`] from `now`.
    pub fn generate_access_token(
        &self,
        sub: &str,
        email: &str,
        role: Role,
        now: u64,
    ) -> Result<String, JwtError> {
        let claims = AccessClaims {
            sub: sub.to_string(),
            email: email.to_string(),
            role,
            token_type: TokenType::Access,
            iat: now,
            exp: now + ACCESS_TOKEN_DURATION_SECS,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    pub fn generate_refresh_token(
        &self,
        sub: &str,
        email: &str,
        now: u64,
    ) -> Result<String, JwtError> {
        let claims = RefreshClaims {
            jti: uuid::Uuid::new_v4().to_string(),
            sub: sub.to_string(),
            email: email.to_string(),
            token_type: TokenType::Refresh,
            iat: now,
            exp: now + REFRESH_TOKEN_DURATION_SECS,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Verify signature, expiry and type of a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = jsonwebtoken::decode::<RefreshClaims>(token, &self.decoding_key, &validation)
            .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != TokenType::Refresh {
            return Err(JwtError::WrongTokenType);
        }
        Ok(token_data.claims)
    }

    /// Verify the signature of an access token, accepting expired ones.
    /// Used when a client exchanges its last access token for a new one.
    pub fn validate_access_token_ignoring_expiry(
        &self,
        token: &str,
    ) -> Result<AccessClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let token_data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != TokenType::Access {
            return Err(JwtError::WrongTokenType);
        }
        Ok(token_data.claims)
    }
}

/// Build an unsigned token around an arbitrary payload. Test helper for
/// claim shapes the signer never produces.
#[cfg(test)]
pub(crate) fn unsigned_token(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.sig", header, body)
}
