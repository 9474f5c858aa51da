use std::{env, net::SocketAddr};

use thiserror::Error;

/// Process configuration, read once from the environment at startup.
///
/// `username` and `password` are accepted for compatibility with older
/// deployments but no operation uses them; upstream authentication is the
/// API key only.
#[derive(Debug, Clone)]
pub struct Config {
    pub redmine_url: String,
    pub api_key: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bind_addr: String,
    pub bind_port: u16,
    pub environment: String,
    pub tls_verify: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("REDMINE_URL is required and must not be empty")]
    MissingRedmineUrl,
    #[error("REDMINE_API_KEY is required and must not be empty")]
    MissingApiKey,
    #[error("PORT must be a valid u16")]
    InvalidPort,
    #[error("TLS_VERIFY must be \"true\" or \"false\"")]
    InvalidTlsVerify,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let redmine_url = env::var("REDMINE_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingRedmineUrl)?;

        let api_key = env::var("REDMINE_API_KEY")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let username = env::var("REDMINE_USERNAME")
            .ok()
            .filter(|value| !value.is_empty());
        let password = env::var("REDMINE_PASSWORD")
            .ok()
            .filter(|value| !value.is_empty());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let bind_port = env::var("PORT")
            .ok()
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(3000);

        let environment = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let tls_verify = env::var("TLS_VERIFY")
            .ok()
            .map(|value| match value.trim() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(ConfigError::InvalidTlsVerify),
            })
            .transpose()?
            .unwrap_or(true);

        let config = Self {
            redmine_url,
            api_key,
            username,
            password,
            bind_addr,
            bind_port,
            environment,
            tls_verify,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}
