//! Metadata fetchers.
//!
//! The scheduler only knows the [`Fetcher`] trait. [`HttpFetcher`] talks to a
//! JSON metadata endpoint; [`TimeoutFetcher`] bounds any fetcher's latency.

pub mod http;
pub mod timeout;
pub mod traits;

pub use http::{HttpFetcher, HttpFetcherConfig};
pub use timeout::TimeoutFetcher;
pub use traits::Fetcher;
