//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `path`: entry point, "full" or "quick"
//! - `fetcher`: fetcher name (e.g. "http")
//! - `status`: "ok" or "error"

/// Total `fetch` calls, by how they were served.
///
/// Labels: `path`, `outcome` ("hit" | "joined" | "queued" | "invalid").
pub const REQUESTS_TOTAL: &str = "huginn_requests_total";

/// Total cache hits.
///
/// Labels: `path`.
pub const CACHE_HITS_TOTAL: &str = "huginn_cache_hits_total";

/// Total cache misses (including expired entries).
///
/// Labels: `path`.
pub const CACHE_MISSES_TOTAL: &str = "huginn_cache_misses_total";

/// Entries removed from the cache store.
///
/// Labels: `reason` ("expired" | "capacity").
pub const CACHE_EVICTIONS_TOTAL: &str = "huginn_cache_evictions_total";

/// Total fetcher invocations.
///
/// Labels: `fetcher`, `status` ("ok" | "error").
pub const FETCHES_TOTAL: &str = "huginn_fetches_total";

/// Fetcher call duration in seconds.
///
/// Labels: `fetcher`.
pub const FETCH_DURATION_SECONDS: &str = "huginn_fetch_duration_seconds";

/// Fetcher calls currently running.
pub const ACTIVE_FETCHES: &str = "huginn_active_fetches";

/// Requests waiting for a dispatch slot.
pub const QUEUE_DEPTH: &str = "huginn_queue_depth";

/// Retries scheduled by the retry coordinator or `with_retry`.
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "huginn_retries_total";

/// Failed persistence writes.
pub const PERSIST_FAILURES_TOTAL: &str = "huginn_persist_failures_total";
