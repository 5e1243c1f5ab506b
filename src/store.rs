//! Session persistence.
//!
//! The store only ever holds one session. Writers go through the session
//! controller; the interceptor and the route guard only read.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::auth::Session;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt session entry {key}: {value}")]
    Corrupt { key: &'static str, value: String },
}

/// Durable key-value storage for the current session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist every field of `session`, replacing whatever was stored.
    /// No reader may observe a mix of old and new fields.
    async fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// The last saved session, or `None` if never saved, cleared, or only
    /// partially present.
    async fn load(&self) -> Result<Option<Session>, StoreError>;

    /// Remove every session field.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Current bearer token, read fresh from storage.
    async fn token(&self) -> Result<Option<String>, StoreError> {
        Ok(self.load().await?.map(|s| s.token))
    }
}

/// Process-local store. Does not survive restarts.
#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        *self.session.lock().await = Some(session.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<Session>, StoreError> {
        Ok(self.session.lock().await.clone())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.session.lock().await = None;
        Ok(())
    }
}
