//! Huginn - deduplicating, rate-bounded media metadata scheduler
//!
//! Many parts of an application ask for metadata about the same media item
//! at about the same time (a preview panel, a format picker, a download
//! estimate). Huginn sits between them and a slow metadata provider: it
//! caches results with a TTL, coalesces concurrent requests for the same
//! item and options into a single provider call, and bounds how many
//! provider calls run at once.
//!
//! # Example
//!
//! ```rust,no_run
//! use huginn::fetcher::{HttpFetcher, HttpFetcherConfig};
//! use huginn::{FetchOptions, Huginn, SchedulerConfig};
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let fetcher = HttpFetcher::new(HttpFetcherConfig::new("http://127.0.0.1:8080/metadata"))?;
//!     let scheduler = Huginn::builder()
//!         .fetcher(fetcher)
//!         .config(SchedulerConfig::new().max_concurrent(2))
//!         .build()?;
//!
//!     let options = FetchOptions::new().quality("1080p");
//!     let metadata = scheduler
//!         .fetch("https://media.example/watch?v=abc", &options)
//!         .await?;
//!     println!("{} ({} formats)", metadata.title, metadata.formats.len());
//!
//!     scheduler.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod retry;
pub mod scheduler;
pub mod telemetry;
pub mod types;
mod version;

// Re-export main types at crate root
pub use error::{FetchError, FetchErrorKind, HuginnError, Result};
pub use fetcher::Fetcher;
pub use retry::{RetryConfig, RetryCoordinator, RetryDecision, with_retry};
pub use scheduler::{Huginn, Outcome, Scheduler, SchedulerBuilder, SchedulerConfig, SchedulerStats};
pub use version::{PKG_VERSION, build_timestamp, git_commit, version_string};

pub use types::{
    CacheKey, FetchOptions, Format, MAX_IDENTIFIER_LEN, Metadata, Thumbnail,
    estimate_download_time, validate_item_id,
};
