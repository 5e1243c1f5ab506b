//! Client configuration assembled once at startup.

use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::guard::RouteTable;

/// Default timeout for individual backend requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on restoring the persisted session at startup.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(3);

/// Session lifetime counted from `issued_at` in mock mode, where tokens are
/// not trusted to carry the only expiry.
pub const MOCK_SESSION_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Simulated backend latency of the mock gateway.
pub const DEFAULT_MOCK_LATENCY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST backend (e.g. "http://localhost:8080/api/")
    pub api_base: Url,
    /// Use the in-memory gateway instead of the network one
    pub mock: bool,
    /// Path to the profile database, or ":memory:"
    pub profile: PathBuf,
    pub request_timeout: Duration,
    pub init_timeout: Duration,
    /// Maximum session age from `issued_at`; `None` trusts the token's own expiry
    pub max_session_age: Option<Duration>,
    pub mock_latency: Duration,
    pub routes: RouteTable,
}

/// Endpoint paths are joined onto the base, which only keeps its last
/// segment when it ends in a slash.
pub fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

impl ClientConfig {
    /// Configuration for the given backend with default timeouts.
    pub fn new(api_base: Url) -> Self {
        Self {
            api_base: with_trailing_slash(api_base),
            mock: false,
            profile: PathBuf::from(":memory:"),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            init_timeout: DEFAULT_INIT_TIMEOUT,
            max_session_age: None,
            mock_latency: DEFAULT_MOCK_LATENCY,
            routes: RouteTable::sigea(),
        }
    }

    /// Switch to the mock gateway, which also bounds sessions by wall clock.
    pub fn with_mock(mut self, mock: bool) -> Self {
        self.mock = mock;
        if mock && self.max_session_age.is_none() {
            self.max_session_age = Some(MOCK_SESSION_WINDOW);
        }
        self
    }
}
