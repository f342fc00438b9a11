//! Application configuration management.
//!
//! Configuration is stored at `~/.config/zamtory/config.json`; every field
//! has a default so the file is optional. A few fields can be overridden
//! from the environment (see `Config::apply_env`).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::client::{DEFAULT_BASE_URL, REQUEST_TIMEOUT_SECS};

/// Application name used for config/data directory paths
const APP_NAME: &str = "zamtory";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Durable session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Automatic token refresh period (5 minutes)
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 5 * 60;

pub const ENV_API_URL: &str = "ZAMTORY_API_URL";
pub const ENV_MOCK_AUTH: &str = "ZAMTORY_MOCK_AUTH";
pub const ENV_DURABLE_BACKEND: &str = "ZAMTORY_DURABLE_BACKEND";

/// Where the durable tier lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DurableBackend {
    /// JSON file in the platform data directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

impl DurableBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Some(DurableBackend::File),
            "keyring" | "keychain" => Some(DurableBackend::Keyring),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// Use the fabricated mock login instead of the auth endpoint
    pub use_mock_authentication: bool,
    pub request_timeout_secs: u64,
    pub refresh_interval_secs: u64,
    pub durable_backend: DurableBackend,
    /// Overrides the durable session file location
    pub durable_store_path: Option<PathBuf>,
    /// Where to go after signing in
    pub landing_route: String,
    /// Where to go after signing out
    pub entry_route: String,
    /// Directory for rolling log files; stderr only when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            use_mock_authentication: false,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            durable_backend: DurableBackend::File,
            durable_store_path: None,
            landing_route: "/editor".to_string(),
            entry_route: "/login".to_string(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Load the config file (defaults when missing) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(flag) = lookup(ENV_MOCK_AUTH) {
            match flag.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.use_mock_authentication = true,
                "0" | "false" | "no" | "off" | "" => self.use_mock_authentication = false,
                other => warn!(value = other, "Ignoring unrecognized {}", ENV_MOCK_AUTH),
            }
        }
        if let Some(backend) = lookup(ENV_DURABLE_BACKEND) {
            match DurableBackend::parse(&backend) {
                Some(parsed) => self.durable_backend = parsed,
                None => warn!(value = %backend, "Ignoring unrecognized {}", ENV_DURABLE_BACKEND),
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Location of the durable session file.
    pub fn session_file(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.durable_store_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(SESSION_FILE))
    }
}
