//! Configuration file handling

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Execution backend connection settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Polling settings for awaiting execution results
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Execution backend connection settings
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// Region the contact-center instance lives in
    #[serde(default = "default_region")]
    pub region: String,

    /// Explicit base URL; derived from the region when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Name of the environment variable holding a bearer credential
    #[serde(default)]
    pub credential_env: Option<String>,

    /// Timeout for a single backend request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Instance used when a suite or command does not name one
    #[serde(default)]
    pub instance_id: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint: None,
            credential_env: None,
            request_timeout_secs: default_request_timeout(),
            instance_id: None,
        }
    }
}

impl BackendConfig {
    /// Base URL of the backend API
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://connect.{}.amazonaws.com", self.region),
        }
    }

    /// Resolve the bearer credential from the configured environment variable
    pub fn credential(&self) -> Option<String> {
        self.credential_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|v| !v.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_region() -> String {
    "us-west-2".to_string()
}
fn default_request_timeout() -> u64 {
    30
}

/// Polling settings in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    /// Delay before each status query
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Status queries issued before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_interval() -> u64 {
    5
}
fn default_max_attempts() -> u32 {
    24
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
