use std::sync::Arc;

use clap::Parser;
use sigea_session::SigeaClient;
use sigea_session::cli::{Args, build_config, init_logging, run_command, validate_api_url};
use sigea_session::navigation::HistoryNavigator;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(api_base) = validate_api_url(&args.api_url) else {
        std::process::exit(1);
    };

    let config = build_config(&args, api_base);
    let navigator = Arc::new(HistoryNavigator::new("/"));

    let client = match SigeaClient::open(&config, navigator).await {
        Ok(client) => client,
        Err(e) => {
            error!(profile = %config.profile.display(), error = %e, "Failed to start");
            std::process::exit(1);
        }
    };

    let state = client.initialize().await;
    info!(state = ?state, "Session checked");

    if let Err(e) = run_command(&client, args.command).await {
        error!(error = %e, retryable = e.is_retryable(), "Command failed");
        std::process::exit(1);
    }
}
