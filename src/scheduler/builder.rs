//! Builder for configuring scheduler instances

use std::sync::Arc;

use tracing::{info, warn};

use super::{Scheduler, SchedulerConfig};
use crate::cache::{CachePersistence, CacheStore};
use crate::fetcher::Fetcher;
use crate::{HuginnError, Result};

/// Main entry point for creating scheduler instances.
pub struct Huginn;

impl Huginn {
    /// Create a new builder for configuring the scheduler.
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }
}

/// Builder for configuring scheduler instances.
pub struct SchedulerBuilder {
    fetcher: Option<Arc<dyn Fetcher>>,
    config: SchedulerConfig,
    persistence: Option<Arc<dyn CachePersistence>>,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            fetcher: None,
            config: SchedulerConfig::default(),
            persistence: None,
        }
    }

    /// Set the metadata fetcher (required).
    pub fn fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Set a shared fetcher (required).
    pub fn shared_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Replace the whole scheduler configuration.
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Carry the cache across restarts.
    ///
    /// Entries are loaded once during [`build`](Self::build) and saved after
    /// every successful fetch. Without this, the cache lives in memory only.
    pub fn persistence(mut self, persistence: impl CachePersistence + 'static) -> Self {
        self.persistence = Some(Arc::new(persistence));
        self
    }

    /// Build the scheduler and start its drain task.
    ///
    /// Must be called from within a tokio runtime. A persistence load failure
    /// is logged and the scheduler starts with an empty cache.
    pub fn build(self) -> Result<Scheduler> {
        let fetcher = self
            .fetcher
            .ok_or_else(|| HuginnError::Configuration("no fetcher configured".into()))?;
        self.config.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(HuginnError::Configuration(
                "scheduler must be built inside a tokio runtime".into(),
            ));
        }

        let cache = CacheStore::new(self.config.ttl, self.config.max_entries);
        if let Some(persistence) = &self.persistence {
            match persistence.load() {
                Ok(entries) => {
                    let loaded = entries.len();
                    let restored = cache.restore(entries);
                    info!(loaded, restored, "loaded persisted cache");
                }
                Err(e) => warn!(error = %e, "failed to load persisted cache, starting empty"),
            }
        }

        info!(
            fetcher = fetcher.name(),
            max_concurrent = self.config.max_concurrent,
            max_entries = self.config.max_entries,
            ttl_secs = self.config.ttl.as_secs(),
            "starting metadata scheduler"
        );
        Ok(Scheduler::start(
            self.config,
            fetcher,
            cache,
            self.persistence,
        ))
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
