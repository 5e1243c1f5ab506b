//! Session and credential types.

use serde::{Deserialize, Serialize};

/// User role for route access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Lowest privilege; the fallback for absent or unknown role claims.
    #[default]
    Participante,
    Organizador,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Participante, Role::Organizador, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Participante => "participante",
            Role::Organizador => "organizador",
            Role::Admin => "admin",
        }
    }

    /// Parse a raw role string. Case and surrounding whitespace are ignored.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "participante" | "participant" => Some(Role::Participante),
            "organizador" | "organizer" => Some(Role::Organizador),
            "admin" | "administrador" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Default landing page for this role.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Participante => "/participante",
            Role::Organizador => "/organizador",
            Role::Admin => "/admin",
        }
    }
}

/// A role string that names none of the known roles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated identity held for the current user.
///
/// A session is either complete or absent; there is no partially
/// initialized variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer credential for authorized requests
    pub token: String,
    pub role: Role,
    pub email: String,
    /// Unix timestamp (seconds) of token acquisition
    pub issued_at: u64,
    /// Longer-lived credential used to mint a new token
    pub refresh_token: Option<String>,
}

/// Login form input.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            remember_me: false,
        }
    }

    pub fn remember(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }
}

/// Registration form input.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFields {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(skip)]
    pub password_confirmation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
}

/// Minimum accepted password length at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

impl RegisterFields {
    /// Check the fields before anything is sent to the backend.
    pub fn validate(&self) -> Result<(), String> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err("First and last name are required".into());
        }
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(format!("Invalid email address: {}", self.email));
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            ));
        }
        if let Some(confirmation) = &self.password_confirmation {
            if confirmation != &self.password {
                return Err("Passwords do not match".into());
            }
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.email.trim(), self.password.clone())
    }
}

/// Normalized result of a successful login or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub token: String,
    pub role: Role,
    pub email: String,
    pub refresh_token: Option<String>,
}

/// How a registration call succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Backend returned a success status.
    Registered,
    /// Backend returned a client-error status with a success-worded message.
    /// Accepted for compatibility; logged so a backend fix can be detected.
    AmbiguousSuccess,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse(" Organizador "), Some(Role::Organizador));
        assert_eq!(Role::parse("participant"), Some(Role::Participante));
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("Organizer".parse::<Role>(), Ok(Role::Organizador));
        assert_eq!(
            "superuser".parse::<Role>(),
            Err(UnknownRole("superuser".into()))
        );
        assert_eq!("".parse::<Role>().unwrap_or_default(), Role::Participante);
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Organizador).unwrap();
        assert_eq!(json, "\"organizador\"");
    }

    fn valid_fields() -> RegisterFields {
        RegisterFields {
            first_name: "Ana".into(),
            last_name: "Pérez".into(),
            email: "ana@x.com".into(),
            password: "secret1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_register_fields_validate() {
        assert!(valid_fields().validate().is_ok());

        let mut short = valid_fields();
        short.password = "abc".into();
        assert!(short.validate().is_err());

        let mut bad_email = valid_fields();
        bad_email.email = "ana.x.com".into();
        assert!(bad_email.validate().is_err());

        let mut mismatch = valid_fields();
        mismatch.password_confirmation = Some("other".into());
        assert!(mismatch.validate().is_err());

        let mut unnamed = valid_fields();
        unnamed.first_name = "  ".into();
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn test_register_fields_serialize_camel_case() {
        let mut fields = valid_fields();
        fields.password_confirmation = Some("secret1".into());
        let value = serde_json::to_value(&fields).unwrap();
        assert_eq!(value["firstName"], "Ana");
        assert!(value.get("passwordConfirmation").is_none());
        assert!(value.get("phone").is_none());
    }
}
