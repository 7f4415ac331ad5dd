//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `VELVET_API_BASE_URL` - Base URL of the Velvet backend API
//!
//! ## Optional
//! - `VELVET_DEBOUNCE_MS` - Quiet period before a dirty cart is pushed
//!   (default: 1000)
//! - `VELVET_REQUEST_TIMEOUT_MS` - Per-request HTTP timeout (default: 10000)
//! - `VELVET_STATE_DIR` - Directory for durable local state
//!   (default: `.velvet`)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default quiet period before a dirty cart is pushed to the server.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// Default per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Default directory for durable local state.
pub const DEFAULT_STATE_DIR: &str = ".velvet";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Velvet backend API.
    pub api_base_url: Url,
    /// Quiet period before a dirty cart is pushed.
    pub debounce: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Directory for durable local state (credential, cart lines).
    pub state_dir: PathBuf,
}

impl Config {
    /// Create a configuration with defaults for everything but the API
    /// base URL.
    #[must_use]
    pub fn new(api_base_url: Url) -> Self {
        Self {
            api_base_url,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Tests use this with a map instead of mutating process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value
    /// cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = lookup("VELVET_API_BASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("VELVET_API_BASE_URL".to_string()))?;
        let api_base_url = Url::parse(&raw_url).map_err(|e| {
            ConfigError::InvalidEnvVar("VELVET_API_BASE_URL".to_string(), e.to_string())
        })?;

        let debounce = parse_millis(&lookup, "VELVET_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)?;
        let request_timeout = parse_millis(
            &lookup,
            "VELVET_REQUEST_TIMEOUT_MS",
            DEFAULT_REQUEST_TIMEOUT_MS,
        )?;

        let state_dir = lookup("VELVET_STATE_DIR")
            .map_or_else(|| PathBuf::from(DEFAULT_STATE_DIR), PathBuf::from);

        Ok(Self {
            api_base_url,
            debounce,
            request_timeout,
            state_dir,
        })
    }
}

fn parse_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let millis = match lookup(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?,
        None => default,
    };
    Ok(Duration::from_millis(millis))
}
