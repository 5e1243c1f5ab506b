//! Session controller: the single owner of the current session.
//!
//! States move `Unknown -> Anonymous | Authenticated`, and back to
//! `Anonymous` on logout, detected expiry, or refresh failure. Every store
//! write goes through `write_lock`. A logout bumps `generation`, so an
//! operation that started before it cannot persist its late result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use super::errors::AuthError;
use super::state::{SessionSnapshot, SessionState};
use super::types::{Credentials, RegisterFields, RegisterOutcome, Role, Session, TokenGrant};
use crate::gateway::{AuthGateway, RefreshRequest};
use crate::jwt;
use crate::store::{SessionStore, StoreError};

pub struct SessionController {
    gateway: Arc<dyn AuthGateway>,
    store: Arc<dyn SessionStore>,
    state: watch::Sender<SessionState>,
    generation: AtomicU64,
    write_lock: Mutex<()>,
    init_timeout: Duration,
    max_session_age: Option<Duration>,
}

/// Why a persisted session was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Malformed,
    Expired,
    WindowElapsed,
}

impl SessionController {
    pub fn new(
        gateway: Arc<dyn AuthGateway>,
        store: Arc<dyn SessionStore>,
        init_timeout: Duration,
        max_session_age: Option<Duration>,
    ) -> Self {
        Self {
            gateway,
            store,
            state: watch::Sender::new(SessionState::Unknown),
            generation: AtomicU64::new(0),
            write_lock: Mutex::new(()),
            init_timeout,
            max_session_age,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::from(&*self.state.borrow())
    }

    /// Receive every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Restore the persisted session, bounded by the init timeout.
    ///
    /// Always leaves the controller in a non-`Unknown` state. A state set by
    /// an operation that finished first (e.g. a login) is not overwritten.
    pub async fn initialize(&self) -> SessionState {
        let restored = match tokio::time::timeout(self.init_timeout, self.restore()).await {
            Ok(Ok(Some(session))) => {
                info!(email = %session.email, role = %session.role, "Session restored");
                SessionState::Authenticated {
                    role: session.role,
                    email: session.email,
                }
            }
            Ok(Ok(None)) => SessionState::Anonymous,
            Ok(Err(e)) => {
                error!(error = %e, "Failed to restore session");
                SessionState::Anonymous
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.init_timeout.as_millis() as u64,
                    "Session check timed out, continuing as anonymous"
                );
                SessionState::Anonymous
            }
        };

        self.state.send_if_modified(|current| {
            if *current == SessionState::Unknown {
                *current = restored;
                true
            } else {
                false
            }
        });
        self.state()
    }

    async fn restore(&self) -> Result<Option<Session>, AuthError> {
        let _guard = self.write_lock.lock().await;
        let session = match self.store.load().await {
            Ok(Some(session)) => session,
            Ok(None) => return Ok(None),
            Err(e @ StoreError::Corrupt { .. }) => {
                warn!(error = %e, "Discarding unreadable persisted session");
                self.store.clear().await?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match self.check(&session, jwt::now_secs()) {
            Ok(()) => Ok(Some(session)),
            Err(reason) => {
                info!(email = %session.email, reason = ?reason, "Discarding persisted session");
                self.store.clear().await?;
                Ok(None)
            }
        }
    }

    fn check(&self, session: &Session, now: u64) -> Result<(), Rejection> {
        jwt::decode(&session.token).map_err(|_| Rejection::Malformed)?;
        if jwt::is_expired(&session.token, now) {
            return Err(Rejection::Expired);
        }
        if let Some(window) = self.max_session_age {
            if now >= session.issued_at.saturating_add(window.as_secs()) {
                return Err(Rejection::WindowElapsed);
            }
        }
        Ok(())
    }

    /// Authenticate and establish a session.
    ///
    /// On failure neither the state nor the store changes.
    pub async fn login(&self, credentials: &Credentials) -> Result<Role, AuthError> {
        let generation = self.generation.load(Ordering::SeqCst);

        let grant = self.gateway.login(credentials).await.inspect_err(|e| {
            warn!(email = %credentials.email, error = %e, "Login failed");
        })?;
        self.establish(grant, generation).await
    }

    async fn establish(&self, grant: TokenGrant, generation: u64) -> Result<Role, AuthError> {
        jwt::decode(&grant.token)?;

        let session = Session {
            token: grant.token,
            role: grant.role,
            email: grant.email,
            issued_at: jwt::now_secs(),
            refresh_token: grant.refresh_token,
        };

        let _guard = self.write_lock.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(email = %session.email, "Login finished after logout, discarding");
            return Err(AuthError::Superseded);
        }
        self.store.save(&session).await?;
        self.state.send_replace(SessionState::Authenticated {
            role: session.role,
            email: session.email.clone(),
        });
        info!(email = %session.email, role = %session.role, "Logged in");
        Ok(session.role)
    }

    /// Create an account, then log in with the same credentials.
    pub async fn register(&self, fields: &RegisterFields) -> Result<Role, AuthError> {
        fields.validate().map_err(AuthError::InvalidInput)?;

        let outcome = self.gateway.register(fields).await.inspect_err(|e| {
            warn!(email = %fields.email, error = %e, "Registration failed");
        })?;
        if outcome == RegisterOutcome::AmbiguousSuccess {
            warn!(email = %fields.email, "Registration accepted through the client-error compatibility path");
        }

        self.login(&fields.credentials()).await
    }

    /// End the session. Idempotent and independent of the network.
    pub async fn logout(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.gateway.logout().await;

        let _guard = self.write_lock.lock().await;
        if let Err(e) = self.store.clear().await {
            error!(error = %e, "Failed to clear session storage");
        }
        let was = self.state.send_replace(SessionState::Anonymous);
        if was.is_authenticated() {
            info!("Logged out");
        }
    }

    /// Replace the token that `stale_token` belonged to.
    ///
    /// If the store already holds a different token, that one is returned
    /// without contacting the backend. A rejected refresh ends the session.
    /// Transport failures are returned as `NetworkError` and keep it.
    pub async fn refresh_session(&self, stale_token: Option<&str>) -> Result<String, AuthError> {
        let generation = self.generation.load(Ordering::SeqCst);

        let session = match self.store.load().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                self.expire(None).await;
                return Err(AuthError::RefreshFailed("no session to refresh".into()));
            }
            Err(e @ StoreError::Corrupt { .. }) => {
                warn!(error = %e, "Stored session is unreadable, ending it");
                self.expire(None).await;
                return Err(AuthError::RefreshFailed(e.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if stale_token.is_some_and(|stale| stale != session.token) {
            debug!("Token already replaced, reusing it");
            return Ok(session.token);
        }

        let request = RefreshRequest {
            token: Some(session.token.clone()),
            refresh_token: session.refresh_token.clone(),
        };
        let refreshed = match self.gateway.refresh(&request).await {
            Ok(refreshed) if !jwt::is_expired_or_malformed(&refreshed.token, jwt::now_secs()) => {
                refreshed
            }
            Ok(_) => {
                self.expire(Some(&session.token)).await;
                return Err(AuthError::RefreshFailed(
                    "refreshed token is malformed or already expired".into(),
                ));
            }
            Err(AuthError::NetworkError(e)) => {
                warn!(error = %e, "Token refresh could not reach the backend");
                return Err(AuthError::NetworkError(e));
            }
            Err(e @ AuthError::RefreshFailed(_)) => {
                warn!(error = %e, "Token refresh rejected, ending session");
                self.expire(Some(&session.token)).await;
                return Err(e);
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.expire(Some(&session.token)).await;
                return Err(AuthError::RefreshFailed(e.to_string()));
            }
        };

        let updated = Session {
            role: jwt::explicit_role(&refreshed.token).unwrap_or(session.role),
            token: refreshed.token,
            email: session.email,
            issued_at: jwt::now_secs(),
            refresh_token: refreshed.refresh_token.or(session.refresh_token),
        };

        let _guard = self.write_lock.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return Err(AuthError::Superseded);
        }
        self.store.save(&updated).await?;
        self.state.send_replace(SessionState::Authenticated {
            role: updated.role,
            email: updated.email.clone(),
        });
        debug!(email = %updated.email, "Token refreshed");
        Ok(updated.token)
    }

    /// Force `Anonymous` after a failed refresh. With `token`, storage is only
    /// cleared if it still holds that token, so a newer login survives.
    async fn expire(&self, token: Option<&str>) {
        let _guard = self.write_lock.lock().await;
        let current = match self.store.load().await {
            Ok(current) => current,
            Err(e) => {
                error!(error = %e, "Failed to read session storage");
                None
            }
        };
        if let (Some(token), Some(current)) = (token, &current) {
            if current.token != token {
                return;
            }
        }
        if let Err(e) = self.store.clear().await {
            error!(error = %e, "Failed to clear session storage");
        }
        self.state.send_replace(SessionState::Anonymous);
    }
}
