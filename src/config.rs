//! Configuration file loading.
//!
//! Configuration is loaded from TOML with the following resolution order:
//! 1. `--config <path>` (CLI flag; must exist)
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//! 4. built-in defaults
//!
//! ```toml
//! [scheduler]
//! ttl_millis = 3600000
//! max_concurrent = 3
//! max_entries = 500
//! drain_interval_millis = 1000
//!
//! [fetcher]
//! endpoint = "http://127.0.0.1:8080/metadata"
//! timeout_secs = 30
//!
//! [cache]
//! persist = true
//! path = "/var/cache/huginn/metadata-cache.json"
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_millis = 1000
//! max_delay_millis = 30000
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::default_cache_path;
use crate::fetcher::HttpFetcherConfig;
use crate::retry::RetryConfig;
use crate::scheduler::SchedulerConfig;
use crate::{HuginnError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub fetcher: FetcherSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub retry: RetrySection,
}

/// `[scheduler]`: recognized options of the scheduling core.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Cache entry lifetime (default: 1 hour).
    #[serde(default = "default_ttl_millis")]
    pub ttl_millis: u64,
    /// Dispatcher concurrency cap (default: 3).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Cache size cap (default: 500).
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Queue re-check interval (default: 1s).
    #[serde(default = "default_drain_interval_millis")]
    pub drain_interval_millis: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            ttl_millis: default_ttl_millis(),
            max_concurrent: default_max_concurrent(),
            max_entries: default_max_entries(),
            drain_interval_millis: default_drain_interval_millis(),
        }
    }
}

fn default_ttl_millis() -> u64 {
    3_600_000
}

fn default_max_concurrent() -> usize {
    3
}

fn default_max_entries() -> usize {
    500
}

fn default_drain_interval_millis() -> u64 {
    1_000
}

impl From<&SchedulerSection> for SchedulerConfig {
    fn from(section: &SchedulerSection) -> Self {
        SchedulerConfig::new()
            .ttl(Duration::from_millis(section.ttl_millis))
            .max_concurrent(section.max_concurrent)
            .max_entries(section.max_entries)
            .drain_interval(Duration::from_millis(section.drain_interval_millis))
    }
}

/// `[fetcher]`: HTTP metadata endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherSection {
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Per-request timeout (default: 30s).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetcherSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

impl FetcherSection {
    /// Fetcher config, if an endpoint is set.
    pub fn http_config(&self) -> Option<HttpFetcherConfig> {
        let endpoint = self.endpoint.as_ref()?;
        Some(HttpFetcherConfig::new(endpoint).timeout(Duration::from_secs(self.timeout_secs)))
    }
}

/// `[cache]`: persistence of the metadata cache.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Save the cache to disk (default: true).
    #[serde(default = "default_true")]
    pub persist: bool,
    /// Cache file (default: `~/.cache/huginn/metadata-cache.json`).
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            persist: true,
            path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

impl CacheSection {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_cache_path)
    }
}

/// `[retry]`: backoff for the CLI's retry loop.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_millis")]
    pub initial_delay_millis: u64,
    #[serde(default = "default_max_delay_millis")]
    pub max_delay_millis: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_millis: default_initial_delay_millis(),
            max_delay_millis: default_max_delay_millis(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_millis() -> u64 {
    1_000
}

fn default_max_delay_millis() -> u64 {
    30_000
}

impl From<&RetrySection> for RetryConfig {
    fn from(section: &RetrySection) -> Self {
        RetryConfig::new()
            .max_attempts(section.max_attempts)
            .initial_delay(Duration::from_millis(section.initial_delay_millis))
            .max_delay(Duration::from_millis(section.max_delay_millis))
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist. Without one, the first existing user or
    /// system file is used, falling back to defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            HuginnError::Configuration(msg) => {
                HuginnError::Configuration(format!("{msg} (in {path:?})"))
            }
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| HuginnError::Configuration(format!("Failed to parse config: {e}")))?;
        config.scheduler_config().validate()?;
        Ok(config)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::from(&self.scheduler)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from(&self.retry)
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.scheduler_config(), SchedulerConfig::default());
        assert!(config.fetcher.endpoint.is_none());
        assert!(config.cache.persist);
        assert_eq!(config.retry_config(), RetryConfig::new());
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_toml(
            r#"
            [scheduler]
            ttl_millis = 60000
            max_concurrent = 5
            max_entries = 20
            drain_interval_millis = 250

            [fetcher]
            endpoint = "http://localhost:9000/meta"
            timeout_secs = 5

            [cache]
            persist = false
            path = "/tmp/huginn.json"

            [retry]
            max_attempts = 4
            initial_delay_millis = 100
            "#,
        )
        .unwrap();

        let scheduler = config.scheduler_config();
        assert_eq!(scheduler.ttl, Duration::from_secs(60));
        assert_eq!(scheduler.max_concurrent, 5);
        assert_eq!(scheduler.max_entries, 20);
        assert_eq!(scheduler.drain_interval, Duration::from_millis(250));

        let http = config.fetcher.http_config().unwrap();
        assert_eq!(http.endpoint, "http://localhost:9000/meta");
        assert_eq!(http.timeout, Duration::from_secs(5));

        assert!(!config.cache.persist);
        assert_eq!(config.cache.resolved_path(), PathBuf::from("/tmp/huginn.json"));

        let retry = config.retry_config();
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.initial_delay, Duration::from_millis(100));
        assert_eq!(retry.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn invalid_limits_are_rejected() {
        let err = Config::from_toml("[scheduler]\nmax_concurrent = 0\n").unwrap_err();
        assert!(matches!(err, HuginnError::Configuration(_)));
    }

    #[test]
    fn malformed_toml_is_rejected() {
        assert!(Config::from_toml("[scheduler\nttl_millis = ").is_err());
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/huginn.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
