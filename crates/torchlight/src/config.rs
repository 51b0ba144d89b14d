//! Client configuration.
//!
//! Configuration can be built in code, parsed from a TOML file, or both,
//! with `TORCHLIGHT_*` environment variables layered on top:
//!
//! ```toml
//! token = "tl_..."
//! theme = "github-light"
//! environment = "production"
//! cache = "file"
//! cache_dir = ".cache/torchlight"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_HOST: &str = "https://api.torchlight.dev";
pub const DEFAULT_THEME: &str = "material-theme-palenight";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// The environment name in which errors are swallowed.
pub const PRODUCTION: &str = "production";

/// Settings for talking to the highlight service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the highlight service.
    pub host: String,
    /// Bearer token. Requests cannot be made without one.
    pub token: Option<String>,
    /// Theme used for blocks that do not name one.
    pub theme: String,
    /// Per-request timeout, in seconds.
    pub request_timeout: u64,
    /// Which cache store to use: `memory`, `file` or `none`.
    #[serde(alias = "cache")]
    pub cache_store_name: String,
    /// Directory for the `file` cache store.
    pub cache_dir: PathBuf,
    /// Deployment environment. Only `production` is fail-open.
    pub environment: String,
    /// Split requests into chunks of this many blocks, sent concurrently.
    pub chunk_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            token: None,
            theme: DEFAULT_THEME.to_string(),
            request_timeout: DEFAULT_TIMEOUT_SECS,
            cache_store_name: "memory".to_string(),
            cache_dir: PathBuf::from(".cache/torchlight"),
            environment: "local".to_string(),
            chunk_size: None,
        }
    }
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::configuration(format!("invalid config: {e}")))
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs_err::read_to_string(path.as_ref())
            .map_err(|e| Error::configuration(e.to_string()))?;
        Self::from_toml(&text)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Apply `TORCHLIGHT_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any `TORCHLIGHT_*` lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(token) = lookup("TORCHLIGHT_TOKEN") {
            self.token = Some(token);
        }
        if let Some(host) = lookup("TORCHLIGHT_HOST") {
            self.host = host;
        }
        if let Some(theme) = lookup("TORCHLIGHT_THEME") {
            self.theme = theme;
        }
        if let Some(environment) = lookup("TORCHLIGHT_ENV") {
            self.environment = environment;
        }
        if let Some(cache) = lookup("TORCHLIGHT_CACHE") {
            self.cache_store_name = cache;
        }
        self
    }

    /// Look a setting up by name, as a string.
    ///
    /// Keys may carry a `torchlight.` prefix.
    pub fn get(&self, key: &str) -> Option<String> {
        let key = key.strip_prefix("torchlight.").unwrap_or(key);
        match key {
            "host" => Some(self.host.clone()),
            "token" => self.token.clone(),
            "theme" => Some(self.theme.clone()),
            "request_timeout" => Some(self.request_timeout.to_string()),
            "cache" | "cache_store_name" => Some(self.cache_store_name.clone()),
            "cache_dir" => Some(self.cache_dir.display().to_string()),
            "environment" => Some(self.environment.clone()),
            "chunk_size" => self.chunk_size.map(|n| n.to_string()),
            _ => None,
        }
    }

    /// The token, if one is set and non-empty.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn is_production(&self) -> bool {
        self.environment == PRODUCTION
    }
}
