//! Normalization of backend response bodies.
//!
//! Backends return the token either at the top level or inside an envelope
//! object. Each field is looked up through a fixed, ordered list of JSON
//! paths; the first non-empty string wins.

use serde_json::Value;

/// A field location inside a response body. Numeric segments index arrays.
pub type FieldPath = &'static [&'static str];

/// Candidate locations of the access token, highest priority first.
pub const TOKEN_PATHS: &[FieldPath] = &[
    &["token"],
    &["accessToken"],
    &["access_token"],
    &["jwt"],
    &["data", "token"],
    &["data", "accessToken"],
    &["data", "access_token"],
    &["data", "jwt"],
    &["result", "token"],
    &["user", "token"],
];

pub const REFRESH_TOKEN_PATHS: &[FieldPath] = &[
    &["refreshToken"],
    &["refresh_token"],
    &["data", "refreshToken"],
    &["data", "refresh_token"],
];

pub const ROLE_PATHS: &[FieldPath] = &[
    &["role"],
    &["rol"],
    &["user", "role"],
    &["user", "rol"],
    &["data", "role"],
    &["roles", "0"],
    &["user", "roles", "0"],
];

pub const EMAIL_PATHS: &[FieldPath] = &[&["email"], &["user", "email"], &["data", "email"]];

/// Where error and status text may appear in a response body.
pub const MESSAGE_PATHS: &[FieldPath] = &[
    &["message"],
    &["mensaje"],
    &["error"],
    &["detail"],
    &["error", "message"],
];

fn lookup<'a>(body: &'a Value, path: FieldPath) -> Option<&'a Value> {
    path.iter().try_fold(body, |node, segment| match node {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// First non-empty string found at any of `paths`, in order.
pub fn first_string(body: &Value, paths: &[FieldPath]) -> Option<String> {
    paths.iter().find_map(|path| {
        lookup(body, *path)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Human-readable message from a response body, falling back to the raw
/// text when the body is not JSON.
pub fn message(body: &Value, raw: &str) -> String {
    first_string(body, MESSAGE_PATHS).unwrap_or_else(|| raw.trim().to_string())
}
