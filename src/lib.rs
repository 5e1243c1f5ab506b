pub mod api;
pub mod auth;
pub mod cli;
pub mod client_config;
pub mod db;
pub mod gateway;
pub mod guard;
pub mod jwt;
pub mod navigation;
pub mod store;

use std::sync::Arc;
use thiserror::Error;

use api::{ApiClient, RequestError};
use auth::{AuthError, SessionController};
use client_config::ClientConfig;
use db::Database;
use gateway::{AuthGateway, build_gateway};
use guard::{GuardDecision, RouteTable};
use navigation::Navigator;
use store::SessionStore;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to open profile database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Failed to build auth gateway: {0}")]
    Gateway(#[from] AuthError),
    #[error("Failed to build API client: {0}")]
    Api(#[from] RequestError),
}

/// The wired-up session core: one controller, one API client, one router.
pub struct SigeaClient {
    pub controller: Arc<SessionController>,
    pub api: ApiClient,
    pub navigator: Arc<dyn Navigator>,
    pub routes: RouteTable,
}

impl SigeaClient {
    /// Build from configuration, opening the profile database and choosing
    /// the gateway. The session is not restored until [`Self::initialize`].
    pub async fn open(
        config: &ClientConfig,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, StartupError> {
        let db = Database::open(&config.profile.to_string_lossy()).await?;
        let store: Arc<dyn SessionStore> = Arc::new(db.sessions());
        let gateway = build_gateway(config)?;
        Self::with_parts(config, gateway, store, navigator)
    }

    /// Build from explicit collaborators.
    pub fn with_parts(
        config: &ClientConfig,
        gateway: Arc<dyn AuthGateway>,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, StartupError> {
        let controller = Arc::new(SessionController::new(
            gateway,
            store.clone(),
            config.init_timeout,
            config.max_session_age,
        ));
        let api = ApiClient::new(
            config.api_base.clone(),
            config.request_timeout,
            store,
            controller.clone(),
            navigator.clone(),
            config.routes.clone(),
        )?;

        Ok(Self {
            controller,
            api,
            navigator,
            routes: config.routes.clone(),
        })
    }

    pub async fn initialize(&self) -> auth::SessionState {
        self.controller.initialize().await
    }

    /// Evaluate navigation to `path` and follow any redirect.
    pub fn navigate(&self, path: &str) -> GuardDecision {
        let decision = self.routes.decide(&self.controller.state(), path);
        match &decision {
            GuardDecision::Render => self.navigator.navigate(path),
            GuardDecision::RedirectToLogin => self.navigator.navigate(self.routes.login_path()),
            GuardDecision::Redirect(target) => self.navigator.navigate(target),
            GuardDecision::Loading => {}
        }
        decision
    }
}
