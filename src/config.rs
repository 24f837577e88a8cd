//! TOML configuration for loadctl.
//!
//! Layered model: compiled-in defaults, then a config file found via the
//! `--config` flag, the `LOADCTL_CONFIG` environment variable or
//! `/etc/loadctl/loadctl.toml`. The service base URL has no compiled-in
//! default; it comes from the file or from the `--api-url` flag
//! (`LOADCTL_API_URL`).

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "LOADCTL_CONFIG";

/// Environment variable overriding `api.base_url`.
pub const API_URL_ENV: &str = "LOADCTL_API_URL";

const SYSTEM_CONFIG_PATH: &str = "/etc/loadctl/loadctl.toml";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no service base URL configured; pass --api-url, set LOADCTL_API_URL, or set api.base_url")]
    MissingBaseUrl,

    #[error("invalid service base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("polling.interval_ms must be greater than zero")]
    ZeroPollInterval,

    #[error("api.request_timeout_secs must be greater than zero")]
    ZeroRequestTimeout,
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadctlConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LoadctlConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load from `explicit` if given (errors are fatal), otherwise try
    /// `LOADCTL_CONFIG`, then the system path, then fall back to defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "LOADCTL_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }

    /// Replace the base URL when an override is present.
    pub fn override_base_url(&mut self, url: Option<String>) {
        if let Some(url) = url {
            self.api.base_url = Some(url);
        }
    }

    /// The validated service base URL.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .api
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?;
        let url = Url::parse(raw).map_err(|e| ConfigError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                url: raw.to_string(),
                reason: "scheme must be http or https".to_string(),
            });
        }
        Ok(url)
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        match self.polling.interval_ms {
            0 => Err(ConfigError::ZeroPollInterval),
            ms => Ok(Duration::from_millis(ms)),
        }
    }

    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        match self.api.request_timeout_secs {
            0 => Err(ConfigError::ZeroRequestTimeout),
            secs => Ok(Duration::from_secs(secs)),
        }
    }
}

// ---------------------------------------------------------------------------
// API
// ---------------------------------------------------------------------------

/// Test service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the service, e.g. `http://localhost:8080`.
    pub base_url: Option<String>,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Delay between progress queries.
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: crate::poller::DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
