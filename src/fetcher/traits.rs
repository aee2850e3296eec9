//! The fetcher seam.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::{FetchOptions, Metadata};

/// Source of raw metadata for an item.
///
/// Latency and failure modes are opaque to the scheduler. Implementations
/// should fail (not hang) when the provider stops responding; wrap with
/// [`TimeoutFetcher`](super::TimeoutFetcher) if the transport has no timeout
/// of its own.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetcher name for logging/metrics.
    fn name(&self) -> &str;

    /// Fetch metadata for `item_id`. `options.quick` asks for a cheaper,
    /// possibly less complete answer.
    async fn fetch_metadata(
        &self,
        item_id: &str,
        options: &FetchOptions,
    ) -> Result<Metadata, FetchError>;
}

#[async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn fetch_metadata(
        &self,
        item_id: &str,
        options: &FetchOptions,
    ) -> Result<Metadata, FetchError> {
        (**self).fetch_metadata(item_id, options).await
    }
}
