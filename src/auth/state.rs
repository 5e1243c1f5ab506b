//! Session state as seen by subscribers.

use serde::Serialize;

use super::types::Role;

/// Controller state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Persisted session not checked yet
    Unknown,
    Anonymous,
    Authenticated { role: Role, email: String },
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            SessionState::Authenticated { role, .. } => Some(*role),
            _ => None,
        }
    }
}

/// What the UI layer renders from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub is_authenticated: bool,
    pub role: Option<Role>,
    pub email: Option<String>,
    pub loading: bool,
}

impl From<&SessionState> for SessionSnapshot {
    fn from(state: &SessionState) -> Self {
        match state {
            SessionState::Unknown => Self {
                is_authenticated: false,
                role: None,
                email: None,
                loading: true,
            },
            SessionState::Anonymous => Self {
                is_authenticated: false,
                role: None,
                email: None,
                loading: false,
            },
            SessionState::Authenticated { role, email } => Self {
                is_authenticated: true,
                role: Some(*role),
                email: Some(email.clone()),
                loading: false,
            },
        }
    }
}
