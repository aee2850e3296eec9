//! In-memory metadata cache with TTL expiry and an insertion-order size cap.
//!
//! Expired entries are treated as absent on lookup and physically removed
//! by [`CacheStore::evict_expired`], which runs before every insert. When an
//! insert would exceed `max_entries`, the least recently *inserted* entries
//! go first; reads never affect eviction order.
//!
//! Live entries expire on the monotonic clock, so a wall-clock step cannot
//! shorten or extend their lifetime. The wall-clock `stored_at` only matters
//! across a persistence round trip, where it sets how much lifetime a
//! restored entry has left.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::telemetry;
use crate::types::{CacheKey, Metadata};

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A cached value and the wall-clock time it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: Arc<Metadata>,
    /// Milliseconds since the Unix epoch.
    pub stored_at: u64,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    pub fn new(key: CacheKey, value: Arc<Metadata>) -> Self {
        Self {
            key,
            value,
            stored_at: now_millis(),
        }
    }

    /// Whether the entry is past its lifetime at `now` (ms since epoch).
    pub fn is_expired(&self, ttl: Duration, now: u64) -> bool {
        u128::from(now.saturating_sub(self.stored_at)) >= ttl.as_millis()
    }
}

/// Point-in-time copy of the live entries, oldest insertion first.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    /// Number of inserts performed when the snapshot was taken.
    pub generation: u64,
    pub entries: Vec<CacheEntry>,
}

struct Slot {
    entry: CacheEntry,
    /// `None` when the deadline is past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(entry: CacheEntry, remaining: Duration) -> Self {
        Self {
            entry,
            expires_at: Instant::now().checked_add(remaining),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<CacheKey, Slot>,
    /// Insertion order; every key in `entries` appears exactly once.
    order: VecDeque<CacheKey>,
    generation: u64,
}

impl StoreInner {
    fn remove_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, slot| !slot.is_expired(now));
        let removed = before - self.entries.len();
        if removed > 0 {
            let entries = &self.entries;
            self.order.retain(|k| entries.contains_key(k));
        }
        removed
    }

    fn install(&mut self, slot: Slot, max_entries: usize) -> usize {
        let key = slot.entry.key.clone();
        if self.entries.remove(&key).is_some() {
            self.order.retain(|k| k != &key);
        }
        let mut evicted = 0;
        while self.entries.len() >= max_entries {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            evicted += 1;
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, slot);
        self.generation += 1;
        evicted
    }
}

/// Thread-safe key → metadata store.
///
/// Readers and writers share one `RwLock`; a reader never observes a
/// half-installed entry. Values are `Arc`s and are never mutated in place,
/// so replacing an entry is a single map insert.
pub struct CacheStore {
    ttl: Duration,
    max_entries: usize,
    inner: RwLock<StoreInner>,
}

impl CacheStore {
    /// Create an empty store. `max_entries` is clamped to at least 1.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            inner: RwLock::new(StoreInner::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up an unexpired value. Returns `None` on miss or expiry.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Metadata>> {
        let now = Instant::now();
        self.read()
            .entries
            .get(key)
            .filter(|slot| !slot.is_expired(now))
            .map(|slot| Arc::clone(&slot.entry.value))
    }

    /// Install or overwrite `key`, stamped with the current time.
    ///
    /// Returns the store generation after the insert.
    pub fn put(&self, key: CacheKey, value: Arc<Metadata>) -> u64 {
        self.insert_entry(CacheEntry::new(key, value))
    }

    fn insert_entry(&self, entry: CacheEntry) -> u64 {
        let slot = Slot::new(entry, self.ttl);
        let mut inner = self.write();
        let expired = inner.remove_expired(Instant::now());
        let evicted = inner.install(slot, self.max_entries);
        let generation = inner.generation;
        drop(inner);

        record_evictions(expired, evicted);
        generation
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let removed = self.write().remove_expired(Instant::now());
        record_evictions(removed, 0);
        removed
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything.
    pub fn clear(&self) {
        let mut inner = self.write();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Copy out the unexpired entries in insertion order.
    pub fn snapshot(&self) -> CacheSnapshot {
        let now = Instant::now();
        let inner = self.read();
        let entries = inner
            .order
            .iter()
            .filter_map(|k| inner.entries.get(k))
            .filter(|slot| !slot.is_expired(now))
            .map(|slot| slot.entry.clone())
            .collect();
        CacheSnapshot {
            generation: inner.generation,
            entries,
        }
    }

    /// Load previously persisted entries, keeping their original timestamps.
    ///
    /// Expired entries are skipped; the rest are installed oldest first so
    /// the size cap keeps the most recent ones, each with the lifetime it had
    /// left when saved. An entry stamped in the future counts as brand new.
    /// Returns how many were kept.
    pub fn restore(&self, mut entries: Vec<CacheEntry>) -> usize {
        let now = now_millis();
        entries.retain(|e| !e.is_expired(self.ttl, now));
        entries.sort_by_key(|e| e.stored_at);

        let mut inner = self.write();
        for entry in entries {
            let age = Duration::from_millis(now.saturating_sub(entry.stored_at));
            let slot = Slot::new(entry, self.ttl.saturating_sub(age));
            inner.install(slot, self.max_entries);
        }
        let restored = inner.entries.len();
        debug!(restored, "restored cache entries");
        restored
    }
}

fn record_evictions(expired: usize, capacity: usize) {
    if expired > 0 {
        metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => "expired")
            .increment(expired as u64);
    }
    if capacity > 0 {
        metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => "capacity")
            .increment(capacity as u64);
    }
}
