//! Key-value session storage.
//!
//! Each session field is one row in `session_kv`. Save and clear run in a
//! single transaction so a reader sees either the old or the new session.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::collections::HashMap;

use crate::auth::{Role, Session};
use crate::store::{SessionStore, StoreError};

pub const TOKEN_KEY: &str = "token";
pub const ROLE_KEY: &str = "role";
pub const EMAIL_KEY: &str = "email";
pub const ISSUED_AT_KEY: &str = "issued_at";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

const ALL_KEYS: [&str; 5] = [TOKEN_KEY, ROLE_KEY, EMAIL_KEY, ISSUED_AT_KEY, REFRESH_TOKEN_KEY];

#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn entries(&self) -> Result<HashMap<String, String>, sqlx::Error> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM session_kv")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let issued_at = session.issued_at.to_string();
        let mut entries = vec![
            (TOKEN_KEY, session.token.as_str()),
            (ROLE_KEY, session.role.as_str()),
            (EMAIL_KEY, session.email.as_str()),
            (ISSUED_AT_KEY, issued_at.as_str()),
        ];
        if let Some(refresh) = &session.refresh_token {
            entries.push((REFRESH_TOKEN_KEY, refresh.as_str()));
        }

        let mut tx = self.pool.begin().await?;
        // Stale keys (e.g. a refresh token the new session lacks) must not survive.
        sqlx::query("DELETE FROM session_kv")
            .execute(&mut *tx)
            .await?;
        for (key, value) in entries {
            sqlx::query("INSERT INTO session_kv (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Session>, StoreError> {
        let mut entries = self.entries().await?;
        let any_stored = !entries.is_empty();

        let (Some(token), Some(role), Some(email), Some(issued_at)) = (
            entries.remove(TOKEN_KEY),
            entries.remove(ROLE_KEY),
            entries.remove(EMAIL_KEY),
            entries.remove(ISSUED_AT_KEY),
        ) else {
            if any_stored {
                tracing::warn!("Partial session found in storage, treating as absent");
            }
            return Ok(None);
        };

        let role: Role = role.parse().map_err(|_| StoreError::Corrupt {
            key: ROLE_KEY,
            value: role.clone(),
        })?;
        let issued_at = issued_at.parse().map_err(|_| StoreError::Corrupt {
            key: ISSUED_AT_KEY,
            value: issued_at.clone(),
        })?;

        Ok(Some(Session {
            token,
            role,
            email,
            issued_at,
            refresh_token: entries.remove(REFRESH_TOKEN_KEY),
        }))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for key in ALL_KEYS {
            sqlx::query("DELETE FROM session_kv WHERE key = ?")
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
