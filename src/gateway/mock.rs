//! In-memory gateway for development without a backend.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::{AuthGateway, RefreshRequest, RefreshedToken};
use crate::auth::{AuthError, Credentials, RegisterFields, RegisterOutcome, Role, TokenGrant};
use crate::jwt::{self, JwtConfig};

/// A user known to the mock backend.
#[derive(Debug, Clone)]
pub struct MockUser {
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl MockUser {
    pub fn new(email: &str, password: &str, role: Role) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            role,
        }
    }
}

/// Fixed key, so a session persisted by one run can be refreshed by the next.
const MOCK_SIGNING_SECRET: &[u8] = b"sigea-mock-backend-signing-key";

pub struct MockAuthGateway {
    users: Mutex<Vec<MockUser>>,
    jwt: JwtConfig,
    latency: Duration,
    refresh_calls: AtomicUsize,
}

impl MockAuthGateway {
    pub fn new(users: Vec<MockUser>, latency: Duration) -> Self {
        Self {
            users: Mutex::new(users),
            jwt: JwtConfig::new(MOCK_SIGNING_SECRET),
            latency,
            refresh_calls: AtomicUsize::new(0),
        }
    }

    /// One demo account per role.
    pub fn seeded(latency: Duration) -> Self {
        Self::new(
            vec![
                MockUser::new("participante@sigea.edu", "participante123", Role::Participante),
                MockUser::new("organizador@sigea.edu", "organizador123", Role::Organizador),
                MockUser::new("admin@sigea.edu", "admin123", Role::Admin),
            ],
            latency,
        )
    }

    /// Number of refresh calls received so far.
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn find_user(&self, email: &str) -> Option<MockUser> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
            .cloned()
    }

    fn issue(&self, user: &MockUser) -> Result<(String, String), AuthError> {
        let now = jwt::now_secs();
        let access = self
            .jwt
            .generate_access_token(&user.email, &user.email, user.role, now)
            .map_err(|e| AuthError::ServerError(e.to_string()))?;
        let refresh = self
            .jwt
            .generate_refresh_token(&user.email, &user.email, now)
            .map_err(|e| AuthError::ServerError(e.to_string()))?;
        Ok((access, refresh))
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl AuthGateway for MockAuthGateway {
    async fn login(&self, credentials: &Credentials) -> Result<TokenGrant, AuthError> {
        self.simulate_latency().await;

        let user = self
            .find_user(&credentials.email)
            .filter(|u| u.password == credentials.password)
            .ok_or(AuthError::InvalidCredentials)?;

        let (token, refresh_token) = self.issue(&user)?;
        debug!(email = %user.email, role = %user.role, "Mock login");
        Ok(TokenGrant {
            token,
            role: user.role,
            email: user.email,
            refresh_token: Some(refresh_token),
        })
    }

    async fn register(&self, fields: &RegisterFields) -> Result<RegisterOutcome, AuthError> {
        self.simulate_latency().await;

        let email = fields.email.trim();
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(AuthError::InvalidInput(format!(
                "El correo {} ya está registrado",
                email
            )));
        }
        users.push(MockUser::new(email, &fields.password, Role::Participante));
        info!(email = %email, "Mock user registered");
        Ok(RegisterOutcome::Registered)
    }

    async fn refresh(&self, request: &RefreshRequest) -> Result<RefreshedToken, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let email = if let Some(refresh) = &request.refresh_token {
            self.jwt
                .validate_refresh_token(refresh)
                .map_err(|e| AuthError::RefreshFailed(e.to_string()))?
                .email
        } else if let Some(token) = &request.token {
            self.jwt
                .validate_access_token_ignoring_expiry(token)
                .map_err(|e| AuthError::RefreshFailed(e.to_string()))?
                .email
        } else {
            return Err(AuthError::RefreshFailed("no credential to refresh".into()));
        };

        let user = self
            .find_user(&email)
            .ok_or_else(|| AuthError::RefreshFailed("user no longer exists".into()))?;
        let (token, refresh_token) = self
            .issue(&user)
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
        Ok(RefreshedToken {
            token,
            refresh_token: Some(refresh_token),
        })
    }
}
