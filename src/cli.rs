//! CLI argument parsing, validation, and command handlers.

use crate::api::{ApiRequest, RequestError};
use crate::auth::{AuthError, Credentials, RegisterFields};
use crate::client_config::{ClientConfig, DEFAULT_INIT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use crate::guard::GuardDecision;
use crate::SigeaClient;
use clap::{Parser, Subcommand};
use reqwest::Method;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "sigea", about = "SIGEA session client")]
pub struct Args {
    /// Base URL of the SIGEA REST API
    #[arg(long, env = "SIGEA_API_URL", default_value = "http://localhost:8080/api/")]
    pub api_url: String,

    /// Use the built-in mock backend instead of the network
    #[arg(long, env = "SIGEA_MOCK")]
    pub mock: bool,

    /// Path to the SQLite profile holding the persisted session
    #[arg(long, env = "SIGEA_PROFILE", default_value = "sigea-profile.db")]
    pub profile: PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    pub request_timeout: u64,

    /// Upper bound on restoring the session at startup, in milliseconds
    #[arg(long, default_value_t = DEFAULT_INIT_TIMEOUT.as_millis() as u64)]
    pub init_timeout_ms: u64,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in and persist the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SIGEA_PASSWORD")]
        password: String,
        /// Ask the backend for a long-lived session
        #[arg(long)]
        remember: bool,
    },
    /// Create an account, then log in with it
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "SIGEA_PASSWORD")]
        password: String,
        /// Checked against the password when given
        #[arg(long)]
        password_confirmation: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        institution: Option<String>,
    },
    /// End the session
    Logout,
    /// Print the current session snapshot as JSON
    Status,
    /// Call the API with the session's token
    Request {
        /// Path relative to the API base, e.g. "eventos"
        path: String,
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Show what navigating to a path would do
    Guard { path: String },
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("{0}")]
    Usage(String),
}

impl CommandError {
    /// Whether running the same command again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CommandError::Auth(e) => e.is_retryable(),
            CommandError::Request(e) => matches!(e, RequestError::Network(_)),
            CommandError::Usage(_) => false,
        }
    }
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_writer(std::io::stderr).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .compact()
            .with_writer(std::io::stderr)
            .init(),
    }
}

/// Parse and validate the API base URL.
/// Returns None and logs an error if validation fails.
pub fn validate_api_url(api_url: &str) -> Option<Url> {
    let url = match Url::parse(api_url) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %api_url, error = %e, "Invalid API URL");
            return None;
        }
    };

    if !matches!(url.scheme(), "http" | "https") {
        error!(url = %api_url, "API URL must use http or https");
        return None;
    }

    Some(url)
}

/// Build ClientConfig from validated arguments.
pub fn build_config(args: &Args, api_base: Url) -> ClientConfig {
    let mut config = ClientConfig::new(api_base).with_mock(args.mock);
    config.profile = args.profile.clone();
    config.request_timeout = Duration::from_secs(args.request_timeout);
    config.init_timeout = Duration::from_millis(args.init_timeout_ms);
    config
}

fn parse_method(method: &str) -> Result<Method, CommandError> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| CommandError::Usage(format!("Invalid HTTP method: {}", method)))
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => error!(error = %e, "Failed to serialize output"),
    }
}

/// Run one command against an initialized client.
pub async fn run_command(client: &SigeaClient, command: Command) -> Result<(), CommandError> {
    match command {
        Command::Login {
            email,
            password,
            remember,
        } => {
            let credentials = Credentials::new(email, password).remember(remember);
            let role = client.controller.login(&credentials).await?;
            client.navigate(client.routes.home_for(role));
            println!("Logged in as {}", role);
        }
        Command::Register {
            first_name,
            last_name,
            email,
            password,
            password_confirmation,
            phone,
            institution,
        } => {
            let fields = RegisterFields {
                first_name,
                last_name,
                email,
                password,
                password_confirmation,
                phone,
                institution,
            };
            let role = client.controller.register(&fields).await?;
            client.navigate(client.routes.home_for(role));
            println!("Registered and logged in as {}", role);
        }
        Command::Logout => {
            client.controller.logout().await;
            client.navigate(client.routes.login_path());
            println!("Logged out");
        }
        Command::Status => {
            print_json(&client.controller.snapshot());
        }
        Command::Request { path, method, data } => {
            let mut request = ApiRequest::new(parse_method(&method)?, &path);
            if let Some(data) = data {
                let body = serde_json::from_str(&data)
                    .map_err(|e| CommandError::Usage(format!("Invalid JSON body: {}", e)))?;
                request = request.json(body);
            }
            let response = client.api.send(request).await?;
            info!(status = %response.status, "Request completed");
            println!("{}", response.status);
            if !response.text.is_empty() {
                println!("{}", response.text);
            }
        }
        Command::Guard { path } => match client.navigate(&path) {
            GuardDecision::Render => println!("render {}", path),
            GuardDecision::Loading => println!("loading"),
            GuardDecision::RedirectToLogin => {
                println!("redirect {}", client.routes.login_path())
            }
            GuardDecision::Redirect(target) => println!("redirect {}", target),
        },
    }
    Ok(())
}
