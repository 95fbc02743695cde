//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development. The user's OpenAI key is not
//! part of the configuration: it is entered per session and held in memory only.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub allowed_origin: String,
    pub openai_api_base: String,
    pub model_name: String,
    pub request_timeout: Duration,
    pub rate_limit_retries: u32,
    pub retry_backoff: Duration,
    pub max_upload_bytes: usize,
    /// Sessions untouched for this long are dropped along with their key.
    pub session_idle: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            log_level: Level::INFO,
            allowed_origin: "http://localhost:3000".to_string(),
            openai_api_base: "https://api.openai.com/v1".to_string(),
            model_name: "gpt-4o".to_string(),
            request_timeout: Duration::from_secs(60),
            rate_limit_retries: 1,
            retry_backoff: Duration::from_millis(1000),
            max_upload_bytes: 20 * 1024 * 1024,
            session_idle: Duration::from_secs(30 * 60),
        }
    }
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
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source; unset variables take
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // --- Server Settings ---
        let bind_address = parse_var(&lookup, "BIND_ADDRESS")?.unwrap_or(defaults.bind_address);

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin = lookup("ALLOWED_ORIGIN").unwrap_or(defaults.allowed_origin);

        // --- Model API Settings ---
        let openai_api_base = lookup("OPENAI_API_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or(defaults.openai_api_base);
        let model_name = lookup("MODEL_NAME").unwrap_or(defaults.model_name);

        let request_timeout = parse_var::<u64, _>(&lookup, "REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        if request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "REQUEST_TIMEOUT_SECS".to_string(),
                "the timeout must be at least one second".to_string(),
            ));
        }

        let rate_limit_retries =
            parse_var(&lookup, "RATE_LIMIT_RETRIES")?.unwrap_or(defaults.rate_limit_retries);
        if rate_limit_retries > 1 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_RETRIES".to_string(),
                "at most one retry is allowed".to_string(),
            ));
        }
        let retry_backoff = parse_var::<u64, _>(&lookup, "RETRY_BACKOFF_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_backoff);

        // --- Upload Settings ---
        let max_upload_bytes =
            parse_var(&lookup, "MAX_UPLOAD_BYTES")?.unwrap_or(defaults.max_upload_bytes);

        // --- Session Settings ---
        let session_idle = parse_var::<u64, _>(&lookup, "SESSION_IDLE_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_idle);
        if session_idle.is_zero() {
            return Err(ConfigError::InvalidValue(
                "SESSION_IDLE_SECS".to_string(),
                "sessions must be kept for at least one second".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            log_level,
            allowed_origin,
            openai_api_base,
            model_name,
            request_timeout,
            rate_limit_retries,
            retry_backoff,
            max_upload_bytes,
            session_idle,
        })
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
        })
        .transpose()
}
