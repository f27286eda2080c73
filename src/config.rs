use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

use crate::models::MAX_LIMIT;

/// Client configuration loaded from `CINEMA_`-prefixed environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the recommendation service, including the `/api` prefix
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Result count used when a caller does not ask for one
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Directory holding the persisted session. Falls back to the platform config dir.
    #[serde(default)]
    pub session_dir: Option<PathBuf>,

    /// Tracing filter directive, overrides `RUST_LOG`
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_api_url() -> String {
    "http://127.0.0.1:5000/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_limit() -> u32 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
            default_limit: default_limit(),
            session_dir: None,
            log_filter: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::prefixed("CINEMA_")
            .from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        if self.default_limit == 0 || self.default_limit > MAX_LIMIT {
            anyhow::bail!(
                "default_limit must be between 1 and {}, got {}",
                MAX_LIMIT,
                self.default_limit
            );
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            anyhow::bail!("api_url must be an http(s) URL, got {}", self.api_url);
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
