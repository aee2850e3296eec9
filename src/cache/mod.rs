//! Caching subsystem.
//!
//! - [`CacheStore`]: in-memory key → metadata map with TTL expiry and an
//!   insertion-order size cap. Owned by the
//!   [`Scheduler`](crate::scheduler::Scheduler); never global.
//!
//! - [`CachePersistence`]: load/save boundary used to carry the store
//!   across restarts. [`JsonFileStore`] is the file-backed implementation,
//!   [`NoPersistence`] a store that keeps nothing. A scheduler built without
//!   any persistence keeps its cache in memory only.

pub mod persist;
pub mod store;

pub use persist::{CachePersistence, JsonFileStore, NoPersistence, default_cache_path};
pub use store::{CacheEntry, CacheSnapshot, CacheStore};
