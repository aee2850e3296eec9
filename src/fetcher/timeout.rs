//! Timeout decorator for fetchers.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::Fetcher;
use crate::error::FetchError;
use crate::types::{FetchOptions, Metadata};

/// Decorator that fails a fetch with [`FetchErrorKind::Timeout`](crate::error::FetchErrorKind::Timeout)
/// once `timeout` elapses.
///
/// The inner future is dropped on timeout, so the dispatch slot it held is
/// released instead of being pinned by a provider that never answers.
pub struct TimeoutFetcher<F> {
    inner: F,
    timeout: Duration,
}

impl<F: Fetcher> TimeoutFetcher<F> {
    pub fn new(inner: F, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for TimeoutFetcher<F> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_metadata(
        &self,
        item_id: &str,
        options: &FetchOptions,
    ) -> Result<Metadata, FetchError> {
        match tokio::time::timeout(self.timeout, self.inner.fetch_metadata(item_id, options)).await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    fetcher = self.inner.name(),
                    item_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "fetch timed out"
                );
                Err(FetchError::timeout(format!(
                    "no response after {:?}",
                    self.timeout
                )))
            }
        }
    }
}
