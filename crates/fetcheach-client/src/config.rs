//! Client configuration
//!
//! Read from the environment, with `.env` support.

use crate::error::{ClientError, Result};
use std::time::Duration;

// ============================================================================
// Client Configuration Constants
// ============================================================================

/// Default dispatcher URL when `FETCHEACH_URL` is not set.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3003";

/// Default request timeout in seconds.
/// A stream may stay open for the server's full one-day ceiling, plus slack.
pub const DEFAULT_TIMEOUT_SECS: u64 = 86_400 + 300;

/// Client configuration
#[derive(Clone)]
pub struct ClientConfig {
    /// Dispatcher base URL
    pub base_url: String,

    /// Bearer credential sent with every submission
    pub api_key: String,

    /// Overall timeout of one submission, stream included
    pub timeout: Duration,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load config from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let base_url =
            std::env::var("FETCHEACH_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        let api_key = std::env::var("FETCHEACH_API_KEY")
            .map_err(|_| ClientError::config("FETCHEACH_API_KEY is not set"))?;
        let timeout_secs = match std::env::var("FETCHEACH_TIMEOUT_SECS") {
            Ok(value) => value.parse().map_err(|_| {
                ClientError::config(format!("FETCHEACH_TIMEOUT_SECS is not a number: {}", value))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let config = Self::new(base_url, api_key).with_timeout(Duration::from_secs(timeout_secs));
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(ClientError::config("API key cannot be empty"));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| ClientError::config(format!("Invalid server URL '{}': {}", self.base_url, e)))?;
        Ok(())
    }
}
