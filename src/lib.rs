use std::sync::Arc;

use axum::{
    middleware,
    routing::get,
    Router,
};
use serde::Serialize;

pub mod config;
pub mod errors;
pub mod http;
pub mod logging;
pub mod redmine_client;

use config::Config;
use redmine_client::RedmineProvider;

/// Non-secret view of the upstream connection, echoed by `test-connection`.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    pub url: String,
    pub has_api_key: bool,
    pub tls_verify: bool,
}

impl ConnectionSummary {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.redmine_url.clone(),
            has_api_key: !config.api_key.is_empty(),
            tls_verify: config.tls_verify,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub connection: Arc<ConnectionSummary>,
    pub provider: Arc<dyn RedmineProvider>,
}

impl AppState {
    pub fn new(connection: ConnectionSummary, provider: Arc<dyn RedmineProvider>) -> Self {
        Self {
            connection: Arc::new(connection),
            provider,
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/test-connection", get(http::handlers::test_connection))
        .route("/user/current", get(http::handlers::current_user))
        .route("/projects", get(http::handlers::list_projects))
        .route("/projects/{id}", get(http::handlers::get_project))
        .route(
            "/issues",
            get(http::handlers::list_issues).post(http::handlers::create_issue),
        )
        .route(
            "/issues/{id}",
            get(http::handlers::get_issue)
                .put(http::handlers::update_issue)
                .delete(http::handlers::delete_issue),
        );

    Router::new()
        .route("/", get(http::handlers::root))
        .nest("/api/redmine", api)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
