use crate::error::{Result, SourceError};
use crate::http_client::{EnhancedHttpClient, HttpClientConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    /// Per-source overrides keyed by source name, e.g. `[sources.MERLINTOON]`
    #[serde(default)]
    pub sources: HashMap<String, SourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Maximum number of retry attempts for failed requests
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial retry delay in milliseconds
    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_ms: u64,

    /// Maximum retry delay in milliseconds
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,

    /// Timeout for HTTP requests in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_true")]
    pub enable_cookies: bool,

    /// Enable gzip/brotli compression
    #[serde(default = "default_true")]
    pub enable_compression: bool,

    /// Fixed User-Agent for every request; rotated when unset or blank
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Settings a source exposes to the host
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct SourceConfig {
    pub domain: Option<String>,
    pub user_agent: Option<String>,
}

fn default_true() -> bool { true }
fn default_max_retries() -> usize { 4 }
fn default_initial_retry_delay() -> u64 { 500 }
fn default_max_retry_delay() -> u64 { 8000 }
fn default_timeout() -> u64 { 30 }

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_retry_delay_ms: 500,
            max_retry_delay_ms: 8000,
            timeout_secs: 30,
            enable_cookies: true,
            enable_compression: true,
            user_agent: None,
        }
    }
}

impl Config {
    /// Read `config.toml` from the working directory, falling back to defaults
    pub fn load() -> Self {
        let path = Path::new("config.toml");
        if path.exists() {
            match Self::load_from(path) {
                Ok(cfg) => return cfg,
                Err(e) => log::warn!("Ignoring config.toml: {}", e),
            }
        }
        Self::default()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| SourceError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SourceError::Config(e.to_string()))
    }

    /// Overrides for `source_name`, empty when the file has none
    pub fn source(&self, source_name: &str) -> SourceConfig {
        self.sources.get(source_name).cloned().unwrap_or_default()
    }
}

impl HttpConfig {
    /// Create an enhanced HTTP client from this configuration
    pub fn create_http_client(&self) -> Result<EnhancedHttpClient> {
        let config = HttpClientConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            initial_retry_delay_ms: self.initial_retry_delay_ms,
            max_retry_delay_ms: self.max_retry_delay_ms,
            enable_cookies: self.enable_cookies,
            enable_gzip: self.enable_compression,
            user_agent: self
                .user_agent
                .as_deref()
                .map(str::trim)
                .filter(|ua| !ua.is_empty())
                .map(String::from),
        };

        EnhancedHttpClient::with_config(config)
    }
}

impl SourceConfig {
    /// Configured domain, or `default` when unset or blank
    pub fn domain_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(default)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref().filter(|ua| !ua.trim().is_empty())
    }
}
