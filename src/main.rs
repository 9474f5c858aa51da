use std::sync::Arc;

use redmine_relay::{
    build_app,
    config::Config,
    logging,
    redmine_client::{HttpRedmineClient, RedmineClientConfig},
    AppState, ConnectionSummary,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let client = HttpRedmineClient::new(RedmineClientConfig::from_config(&config))?;

    let bind_socket = config.bind_socket()?;
    let state = AppState::new(ConnectionSummary::from_config(&config), Arc::new(client));
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        environment = %config.environment,
        redmine_url = %config.redmine_url,
        "server starting"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
