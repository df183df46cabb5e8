//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: String,
    pub openai_api_key: Option<String>,
    pub coach_model: String,
    pub coach_max_tokens: u32,
    pub coach_temperature: f32,
    /// Upper bound on a single completion call.
    pub completion_timeout: Duration,
    /// Number of prior turns included in each prompt.
    pub history_limit: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", "0.0.0.0:3000")?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = std::env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        // --- Load API Keys (as optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();

        // --- Load Coach Settings ---
        let coach_model =
            std::env::var("COACH_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let coach_max_tokens = parse_var("COACH_MAX_TOKENS", "250")?;
        let coach_temperature = parse_var("COACH_TEMPERATURE", "0.7")?;
        let timeout_secs: u64 = parse_var("COMPLETION_TIMEOUT_SECS", "60")?;
        let history_limit = parse_var("HISTORY_LIMIT", "5")?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            openai_api_key,
            coach_model,
            coach_max_tokens,
            coach_temperature,
            completion_timeout: Duration::from_secs(timeout_secs),
            history_limit,
        })
    }
}

/// Reads `name`, falling back to `default`, and parses it.
fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

#[cfg(test)]
impl Config {
    /// A configuration that never touches the environment.
    pub fn for_tests() -> Self {
        Self {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: "postgres://unused".to_string(),
            log_level: Level::INFO,
            cors_origin: "http://localhost:3000".to_string(),
            openai_api_key: None,
            coach_model: "test-model".to_string(),
            coach_max_tokens: 250,
            coach_temperature: 0.7,
            completion_timeout: Duration::from_secs(5),
            history_limit: 5,
        }
    }
}
