//! Authentication session core.
//!
//! The controller owns the current session: it is the only writer of both
//! the in-memory state and the persisted store. UI code subscribes to its
//! state and calls `login`, `register` and `logout`; the HTTP interceptor
//! calls `refresh_session`.

mod controller;
mod errors;
mod state;
mod types;

pub use controller::SessionController;
pub use errors::{AuthError, TokenError};
pub use state::{SessionSnapshot, SessionState};
pub use types::{
    Credentials, MIN_PASSWORD_LENGTH, RegisterFields, RegisterOutcome, Role, Session, TokenGrant,
    UnknownRole,
};
