//! Auth client configuration.
//!
//! Configuration is loaded from environment variables. The app secret and
//! the Redis URL are redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default safety margin subtracted from the client token's expiry.
pub const DEFAULT_TOKEN_SAFETY_MARGIN_SECONDS: u64 = 200;

/// Upper bound for the safety margin; a larger margin would refresh on every call.
pub const MAX_TOKEN_SAFETY_MARGIN_SECONDS: u64 = 3600;

/// Default timeout for authority HTTP calls.
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;

/// Default period of the internal key refresh task.
pub const DEFAULT_KEY_REFRESH_INTERVAL_SECONDS: u64 = 3600;

/// Smallest accepted key refresh period.
pub const MIN_KEY_REFRESH_INTERVAL_SECONDS: u64 = 60;

/// Default policy cache URL.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Auth client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Authority base URL, e.g. `http://auth.internal:7080/auth` (no trailing slash).
    pub base_url: String,

    /// This client's app id.
    pub app_id: String,

    /// This client's secret.
    pub app_secret: SecretString,

    /// Policy cache connection URL.
    pub redis_url: String,

    /// Refresh the client token this long before its literal expiry.
    pub token_safety_margin: Duration,

    /// Timeout applied to every authority HTTP call.
    pub http_timeout: Duration,

    /// Period of the internal key refresh task.
    pub key_refresh_interval: Duration,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("redis_url", &"[REDACTED]")
            .field("token_safety_margin", &self.token_safety_margin)
            .field("http_timeout", &self.http_timeout)
            .field("key_refresh_interval", &self.key_refresh_interval)
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid token safety margin configuration: {0}")]
    InvalidSafetyMargin(String),

    #[error("Invalid HTTP timeout configuration: {0}")]
    InvalidHttpTimeout(String),

    #[error("Invalid key refresh interval configuration: {0}")]
    InvalidKeyRefreshInterval(String),
}

impl ClientConfig {
    /// Build a configuration with defaults for everything but the credentials.
    pub fn new(base_url: impl Into<String>, app_id: impl Into<String>, app_secret: SecretString) -> Self {
        Self {
            base_url: trim_base_url(base_url.into()),
            app_id: app_id.into(),
            app_secret,
            redis_url: DEFAULT_REDIS_URL.to_string(),
            token_safety_margin: Duration::from_secs(DEFAULT_TOKEN_SAFETY_MARGIN_SECONDS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS),
            key_refresh_interval: Duration::from_secs(DEFAULT_KEY_REFRESH_INTERVAL_SECONDS),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let base_url = required(vars, "AUTH_BASE_URL")?;
        let app_id = required(vars, "AUTH_APP_ID")?;
        let app_secret = SecretString::from(required(vars, "AUTH_APP_SECRET")?);

        let mut config = Self::new(base_url, app_id, app_secret);

        if let Some(url) = vars.get("REDIS_URL") {
            config.redis_url = url.clone();
        }

        if let Some(value_str) = vars.get("AUTH_TOKEN_SAFETY_MARGIN_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidSafetyMargin(format!(
                    "AUTH_TOKEN_SAFETY_MARGIN_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value >= MAX_TOKEN_SAFETY_MARGIN_SECONDS {
                return Err(ConfigError::InvalidSafetyMargin(format!(
                    "AUTH_TOKEN_SAFETY_MARGIN_SECONDS must be below {} seconds, got {}",
                    MAX_TOKEN_SAFETY_MARGIN_SECONDS, value
                )));
            }

            config.token_safety_margin = Duration::from_secs(value);
        }

        if let Some(value_str) = vars.get("AUTH_HTTP_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidHttpTimeout(format!(
                    "AUTH_HTTP_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidHttpTimeout(
                    "AUTH_HTTP_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }

            config.http_timeout = Duration::from_secs(value);
        }

        if let Some(value_str) = vars.get("AUTH_KEY_REFRESH_INTERVAL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidKeyRefreshInterval(format!(
                    "AUTH_KEY_REFRESH_INTERVAL_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value < MIN_KEY_REFRESH_INTERVAL_SECONDS {
                return Err(ConfigError::InvalidKeyRefreshInterval(format!(
                    "AUTH_KEY_REFRESH_INTERVAL_SECONDS must be at least {}, got {}",
                    MIN_KEY_REFRESH_INTERVAL_SECONDS, value
                )));
            }

            config.key_refresh_interval = Duration::from_secs(value);
        }

        Ok(config)
    }

    /// Set the token safety margin.
    #[must_use]
    pub fn with_token_safety_margin(mut self, margin: Duration) -> Self {
        self.token_safety_margin = margin;
        self
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Set the internal key refresh period.
    #[must_use]
    pub fn with_key_refresh_interval(mut self, interval: Duration) -> Self {
        self.key_refresh_interval = interval;
        self
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
