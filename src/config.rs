use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_port")]
    pub port: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbConfig {
    #[serde(alias = "baseurl", rename = "baseurl")]
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(alias = "imagebaseurl", rename = "imagebaseurl")]
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,
    /// Name of the environment variable holding the bearer token.
    #[serde(alias = "tokenenv", rename = "tokenenv")]
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Per-attempt timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            image_base_url: default_image_base_url(),
            token_env: default_token_env(),
            timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_retry_total")]
    pub total: u32,
    #[serde(alias = "backofffactor", rename = "backofffactor")]
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(alias = "backoffmax", rename = "backoffmax")]
    #[serde(default = "default_backoff_max")]
    pub backoff_max: f64,
    #[serde(default = "default_retry_statuses")]
    pub statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            total: default_retry_total(),
            backoff_factor: default_backoff_factor(),
            backoff_max: default_backoff_max(),
            statuses: default_retry_statuses(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheKeyScope {
    /// Path and query string.
    #[default]
    Full,
    Path,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Trending cache lifetime in seconds. Zero disables caching.
    #[serde(default = "default_cache_ttl")]
    pub ttl: u64,
    #[serde(default)]
    pub key: CacheKeyScope,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_cache_ttl(),
            key: CacheKeyScope::default(),
        }
    }
}

fn default_port() -> String {
    "8000".to_string()
}

fn default_base_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_image_base_url() -> String {
    crate::catalog::shape::IMAGE_BASE_URL.to_string()
}

fn default_token_env() -> String {
    "TMDB_API_KEY".to_string()
}

fn default_timeout() -> f64 {
    10.0
}

fn default_retry_total() -> u32 {
    3
}

fn default_backoff_factor() -> f64 {
    0.3
}

fn default_backoff_max() -> f64 {
    120.0
}

fn default_retry_statuses() -> Vec<u16> {
    vec![429, 500, 502, 503]
}

fn default_cache_ttl() -> u64 {
    600
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_string(), e))?;

        Self::from_yaml(&content).map_err(|e| ConfigError::ParseError(path.to_string(), e))
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not to an empty mapping.
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(content)
    }

    /// Reads the bearer token from the environment variable named in `tmdb.tokenenv`.
    pub fn api_token(&self) -> Result<String, ConfigError> {
        self.api_token_from(|name| std::env::var(name).ok())
    }

    pub fn api_token_from<F>(&self, lookup: F) -> Result<String, ConfigError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        match lookup(&self.tmdb.token_env) {
            Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Err(ConfigError::MissingToken(self.tmdb.token_env.clone())),
        }
    }

    pub fn timeout(&self) -> Duration {
        seconds(self.tmdb.timeout)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl)
    }
}

/// Converts a configured number of seconds at microsecond precision.
/// Negative or non-finite values become zero.
pub(crate) fn seconds(value: f64) -> Duration {
    if !value.is_finite() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_micros((value * 1_000_000.0).round() as u64)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(String, std::io::Error),
    #[error("Failed to parse config file {0}: {1}")]
    ParseError(String, serde_yaml::Error),
    #[error("{0} environment variable is not set")]
    MissingToken(String),
}
