//! Scheduler configuration.

use std::time::Duration;

use crate::{HuginnError, Result};

/// Configuration for a [`Scheduler`](super::Scheduler).
///
/// ```rust
/// # use huginn::SchedulerConfig;
/// # use std::time::Duration;
/// let config = SchedulerConfig::new()
///     .ttl(Duration::from_secs(600))
///     .max_concurrent(2)
///     .max_entries(1_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Lifetime of a cached entry. Default: 1 hour.
    pub ttl: Duration,
    /// Maximum concurrent fetcher calls. Default: 3.
    pub max_concurrent: usize,
    /// Maximum cached entries. Default: 500.
    pub max_entries: usize,
    /// How often the queue is re-checked without a wake-up. Default: 1s.
    pub drain_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_concurrent: 3,
            max_entries: 500,
            drain_interval: Duration::from_secs(1),
        }
    }
}

impl SchedulerConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache entry lifetime.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the dispatcher concurrency cap.
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set the cache size cap.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the periodic queue re-check interval.
    pub fn drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(HuginnError::Configuration(
                "max_concurrent must be at least 1".into(),
            ));
        }
        if self.max_entries == 0 {
            return Err(HuginnError::Configuration(
                "max_entries must be at least 1".into(),
            ));
        }
        if self.drain_interval.is_zero() {
            return Err(HuginnError::Configuration(
                "drain_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
