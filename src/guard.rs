//! Role-gated route decisions.

use std::collections::HashMap;

use crate::auth::{Role, SessionState};

/// Access requirement declared by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Login and registration pages; authenticated users are sent home.
    GuestOnly,
    Authenticated,
    Role(Role),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Render,
    /// Session not checked yet; show a neutral placeholder.
    Loading,
    RedirectToLogin,
    Redirect(String),
}

/// Decide what to do with a navigation to a route requiring `access`.
pub fn evaluate(state: &SessionState, access: Access, routes: &RouteTable) -> GuardDecision {
    if access == Access::Public {
        return GuardDecision::Render;
    }

    match (state, access) {
        (SessionState::Unknown, _) => GuardDecision::Loading,
        (SessionState::Anonymous, Access::GuestOnly) => GuardDecision::Render,
        (SessionState::Anonymous, _) => GuardDecision::RedirectToLogin,
        (SessionState::Authenticated { role, .. }, Access::GuestOnly) => {
            GuardDecision::Redirect(routes.home_for(*role).to_string())
        }
        (SessionState::Authenticated { role, .. }, Access::Role(required)) if *role != required => {
            GuardDecision::Redirect(routes.home_for(*role).to_string())
        }
        (SessionState::Authenticated { .. }, _) => GuardDecision::Render,
    }
}

/// Access rules by path prefix, plus the login page and role landing pages.
#[derive(Debug, Clone)]
pub struct RouteTable {
    login_path: String,
    homes: HashMap<Role, String>,
    rules: Vec<(String, Access)>,
}

impl RouteTable {
    /// Empty table: every path is public.
    pub fn new(login_path: &str) -> Self {
        Self {
            login_path: login_path.to_string(),
            homes: Role::ALL
                .iter()
                .map(|role| (*role, role.home_path().to_string()))
                .collect(),
            rules: Vec::new(),
        }
    }

    /// The SIGEA application routes.
    pub fn sigea() -> Self {
        Self::new("/login")
            .route("/", Access::Public)
            .route("/eventos", Access::Public)
            .route("/verificar-certificado", Access::Public)
            .route("/login", Access::GuestOnly)
            .route("/registro", Access::GuestOnly)
            .route("/perfil", Access::Authenticated)
            .route("/participante", Access::Role(Role::Participante))
            .route("/organizador", Access::Role(Role::Organizador))
            .route("/admin", Access::Role(Role::Admin))
    }

    pub fn route(mut self, prefix: &str, access: Access) -> Self {
        self.rules.push((normalize(prefix).to_string(), access));
        self
    }

    pub fn home(mut self, role: Role, path: &str) -> Self {
        self.homes.insert(role, path.to_string());
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn home_for(&self, role: Role) -> &str {
        self.homes
            .get(&role)
            .map(String::as_str)
            .unwrap_or_else(|| role.home_path())
    }

    /// Access rule of the longest matching prefix. Unlisted paths are public.
    pub fn access_for(&self, path: &str) -> Access {
        let path = normalize(path);
        self.rules
            .iter()
            .filter(|(prefix, _)| matches_prefix(path, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, access)| *access)
            .unwrap_or(Access::Public)
    }

    pub fn decide(&self, state: &SessionState, path: &str) -> GuardDecision {
        evaluate(state, self.access_for(path), self)
    }

    /// Whether `path` is the login page (ignoring query and trailing slash).
    pub fn is_login(&self, path: &str) -> bool {
        normalize(path) == normalize(&self.login_path)
    }
}

/// Strip query, fragment and trailing slash.
fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
