//! Deduplicating, concurrency-bounded metadata scheduler.
//!
//! # Request flow
//!
//! 1. [`Scheduler::fetch`] validates the item id and derives a [`CacheKey`].
//! 2. A cache hit returns immediately.
//! 3. On a miss, the caller joins the pending request for that key, or
//!    creates one and queues the key.
//! 4. The drain task admits queued keys while fewer than `max_concurrent`
//!    fetches are running, and spawns a fetcher call for each.
//! 5. On completion the result is cached (success only), every waiter gets
//!    the same [`Outcome`], and the drain task is woken to fill the freed
//!    slot.
//!
//! # Admission authority
//!
//! Only the drain task pops the queue. It runs one admission pass per
//! interval tick and per wake-up (new request, completed fetch). A pass
//! takes the state lock, so the `active < max_concurrent` check and the
//! increment that follows are atomic, and two triggers firing together just
//! run two passes back to back.
//!
//! # Locking
//!
//! Queue, pending table and active count share one `std::sync::Mutex`, never
//! held across an `.await`. The cache store has its own `RwLock`. A
//! completed fetch is written to the cache *before* its pending entry is
//! removed, and `fetch` re-checks the cache under the state lock, so a key
//! is never fetched twice because of a check-then-enqueue race.

mod builder;
mod config;
pub(crate) mod pending;
pub(crate) mod queue;

pub use builder::{Huginn, SchedulerBuilder};
pub use config::SchedulerConfig;
pub use pending::Outcome;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::{CachePersistence, CacheStore};
use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::telemetry;
use crate::types::{CacheKey, FetchOptions, Metadata, validate_item_id};
use crate::{HuginnError, Result};

use pending::{PendingRequest, PendingTable};
use queue::RequestQueue;

/// Point-in-time scheduler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Fetcher calls running now.
    pub active: usize,
    /// Keys waiting for a dispatch slot.
    pub queued: usize,
    /// Queued plus running requests.
    pub pending: usize,
    /// Entries in the cache store.
    pub cached: usize,
}

struct SchedulerState {
    queue: RequestQueue,
    pending: PendingTable,
    active: usize,
    closed: bool,
}

/// A request popped from the queue, ready to hand to the fetcher.
struct Admitted {
    key: CacheKey,
    item_id: String,
    options: FetchOptions,
    queued_for: Duration,
}

struct Inner {
    config: SchedulerConfig,
    fetcher: Arc<dyn Fetcher>,
    cache: CacheStore,
    persistence: Option<Arc<dyn CachePersistence>>,
    state: Mutex<SchedulerState>,
    /// Wakes the drain task.
    wake: Arc<Notify>,
    /// Signalled whenever the active count drops to zero.
    idle: Notify,
    shutdown: watch::Sender<bool>,
    /// Set once shutdown has fully completed.
    stopped: watch::Sender<bool>,
    /// Highest cache generation written to persistence.
    saved_generation: Mutex<u64>,
}

/// Metadata scheduler: the single entry point for cached, deduplicated,
/// rate-bounded metadata lookups.
///
/// Cheap to clone; clones share the same cache, queue and drain task.
/// Build with [`Huginn::builder()`].
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
    drain_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.inner.config)
            .field("fetcher", &self.inner.fetcher.name())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Scheduler {
    /// Assemble the scheduler and start its drain task.
    ///
    /// Must be called inside a tokio runtime.
    pub(crate) fn start(
        config: SchedulerConfig,
        fetcher: Arc<dyn Fetcher>,
        cache: CacheStore,
        persistence: Option<Arc<dyn CachePersistence>>,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (stopped, _) = watch::channel(false);
        let inner = Arc::new(Inner {
            config,
            fetcher,
            cache,
            persistence,
            state: Mutex::new(SchedulerState {
                queue: RequestQueue::new(),
                pending: PendingTable::new(),
                active: 0,
                closed: false,
            }),
            wake: Arc::new(Notify::new()),
            idle: Notify::new(),
            shutdown,
            stopped,
            saved_generation: Mutex::new(0),
        });

        let drain_task = tokio::spawn(run_drain_loop(
            Arc::downgrade(&inner),
            Arc::clone(&inner.wake),
            shutdown_rx,
            inner.config.drain_interval,
        ));

        Self {
            inner,
            drain_task: Arc::new(Mutex::new(Some(drain_task))),
        }
    }

    /// Get metadata for `item_id`, from cache or by fetching it.
    ///
    /// Concurrent calls that derive the same key share a single fetcher
    /// invocation and all observe the same outcome. Failures are never
    /// cached; calling again after an error starts a fresh fetch.
    pub async fn fetch(&self, item_id: &str, options: &FetchOptions) -> Result<Arc<Metadata>> {
        self.inner.fetch(item_id, options.clone()).await
    }

    /// Lightweight preview lookup.
    ///
    /// Same as [`fetch`](Self::fetch) with the `quick` flag set, so the
    /// result lives in its own cache slot. Debouncing is the caller's job.
    pub async fn fetch_quick(
        &self,
        item_id: &str,
        options: &FetchOptions,
    ) -> Result<Arc<Metadata>> {
        self.inner
            .fetch(item_id, options.clone().quick(true))
            .await
    }

    /// Look up the cache without fetching on a miss.
    pub fn cached(&self, item_id: &str, options: &FetchOptions) -> Option<Arc<Metadata>> {
        let item_id = validate_item_id(item_id).ok()?;
        self.inner.cache.get(&CacheKey::derive(item_id, options))
    }

    /// The cache store backing this scheduler.
    pub fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> SchedulerStats {
        let state = self.inner.lock_state();
        SchedulerStats {
            active: state.active,
            queued: state.queue.len(),
            pending: state.pending.len(),
            cached: self.inner.cache.len(),
        }
    }

    /// Stop the scheduler.
    ///
    /// Requests still waiting in the queue are rejected with
    /// [`HuginnError::Cancelled`]. Fetches already running are allowed to
    /// finish and their waiters receive the real result. The cache is then
    /// saved one last time and released. Calls that miss the cache after
    /// shutdown fail with `Cancelled`.
    ///
    /// Safe to call from several clones at once: every caller returns only
    /// after the first one has finished draining and saving.
    pub async fn shutdown(&self) {
        let cancelled: Option<Vec<PendingRequest>> = {
            let mut state = self.inner.lock_state();
            if state.closed {
                None
            } else {
                state.closed = true;
                let queued = state.queue.drain();
                let cancelled = queued
                    .iter()
                    .filter_map(|key| state.pending.remove(key))
                    .collect();
                Some(cancelled)
            }
        };
        let Some(cancelled) = cancelled else {
            self.wait_stopped().await;
            return;
        };
        self.inner.shutdown.send_replace(true);

        let drain_task = self
            .drain_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = drain_task {
            if let Err(e) = handle.await {
                warn!(error = %e, "drain task ended abnormally");
            }
        }

        let cancelled_count = cancelled.len();
        for request in cancelled {
            request.resolve(Outcome::Failure(HuginnError::Cancelled));
        }

        // Wait for in-flight fetches.
        loop {
            let idle = self.inner.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            let active = self.inner.lock_state().active;
            if active == 0 {
                break;
            }
            idle.await;
        }

        if self.inner.persistence.is_some() {
            let inner = Arc::clone(&self.inner);
            if let Err(e) = tokio::task::spawn_blocking(move || inner.save_snapshot()).await {
                warn!(error = %e, "final cache save did not complete");
            }
        }
        self.inner.cache.clear();
        metrics::gauge!(telemetry::QUEUE_DEPTH).set(0.0);

        self.inner.stopped.send_replace(true);
        info!(cancelled = cancelled_count, "scheduler shut down");
    }

    async fn wait_stopped(&self) {
        let mut stopped = self.inner.stopped.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = stopped.wait_for(|done| *done).await;
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch(&self, item_id: &str, options: FetchOptions) -> Result<Arc<Metadata>> {
        let path = if options.quick { "quick" } else { "full" };
        let item_id = match validate_item_id(item_id) {
            Ok(id) => id,
            Err(e) => {
                metrics::counter!(telemetry::REQUESTS_TOTAL, "path" => path, "outcome" => "invalid")
                    .increment(1);
                return Err(e);
            }
        };
        let key = CacheKey::derive(item_id, &options);

        if let Some(value) = self.cache.get(&key) {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "path" => path).increment(1);
            metrics::counter!(telemetry::REQUESTS_TOTAL, "path" => path, "outcome" => "hit")
                .increment(1);
            return Ok(value);
        }
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "path" => path).increment(1);

        let receiver = {
            let mut state = self.lock_state();
            if state.closed {
                return Err(HuginnError::Cancelled);
            }
            if let Some(rx) = state.pending.join(&key) {
                let waiters = state.pending.get(&key).map_or(0, PendingRequest::waiter_count);
                debug!(%key, waiters, "joined pending request");
                metrics::counter!(telemetry::REQUESTS_TOTAL, "path" => path, "outcome" => "joined")
                    .increment(1);
                rx
            } else if let Some(value) = self.cache.get(&key) {
                // Completed between the first lookup and taking the lock.
                metrics::counter!(telemetry::REQUESTS_TOTAL, "path" => path, "outcome" => "hit")
                    .increment(1);
                return Ok(value);
            } else {
                let (request, rx) = PendingRequest::new(key.clone(), item_id.to_owned(), options);
                state.pending.insert(request);
                state.queue.push(key.clone());
                metrics::gauge!(telemetry::QUEUE_DEPTH).set(state.queue.len() as f64);
                debug!(%key, queued = state.queue.len(), "queued request");
                metrics::counter!(telemetry::REQUESTS_TOTAL, "path" => path, "outcome" => "queued")
                    .increment(1);
                self.wake.notify_one();
                rx
            }
        };

        match receiver.await {
            Ok(outcome) => outcome.into_result(),
            // Sender dropped without an outcome: the scheduler went away.
            Err(_) => Err(HuginnError::Cancelled),
        }
    }

    /// Admit queued requests up to the concurrency cap.
    fn admit(self: &Arc<Self>) {
        let admitted = {
            let mut state = self.lock_state();
            if state.closed || state.queue.is_empty() {
                return;
            }
            let mut admitted = Vec::new();
            while state.active < self.config.max_concurrent {
                let Some(key) = state.queue.pop_front() else {
                    break;
                };
                let Some(request) = state.pending.get(&key) else {
                    continue;
                };
                admitted.push(Admitted {
                    item_id: request.item_id.clone(),
                    options: request.options.clone(),
                    queued_for: request.enqueued_at.elapsed(),
                    key,
                });
                state.active += 1;
            }
            if !admitted.is_empty() {
                metrics::gauge!(telemetry::ACTIVE_FETCHES).set(state.active as f64);
                metrics::gauge!(telemetry::QUEUE_DEPTH).set(state.queue.len() as f64);
            }
            admitted
        };

        for request in admitted {
            debug!(
                key = %request.key,
                queued_ms = request.queued_for.as_millis() as u64,
                "admitted request"
            );
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                let result = inner.run_fetcher(&request.item_id, &request.options).await;
                inner.complete(request.key, result);
            });
        }
    }

    async fn run_fetcher(
        &self,
        item_id: &str,
        options: &FetchOptions,
    ) -> std::result::Result<Metadata, FetchError> {
        let fetcher = self.fetcher.name().to_owned();
        let start = Instant::now();
        let result = AssertUnwindSafe(self.fetcher.fetch_metadata(item_id, options))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(FetchError::provider(format!(
                    "fetcher panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::FETCHES_TOTAL, "fetcher" => fetcher.clone(), "status" => status)
            .increment(1);
        metrics::histogram!(telemetry::FETCH_DURATION_SECONDS, "fetcher" => fetcher)
            .record(start.elapsed().as_secs_f64());
        result
    }

    /// Route a fetch result to its waiters and release the dispatch slot.
    fn complete(self: &Arc<Self>, key: CacheKey, result: std::result::Result<Metadata, FetchError>) {
        let outcome = match result {
            Ok(metadata) => {
                let value = Arc::new(metadata);
                self.cache.put(key.clone(), Arc::clone(&value));
                self.persist();
                Outcome::Success(value)
            }
            Err(e) => {
                debug!(%key, error = %e, "fetch failed");
                Outcome::Failure(HuginnError::Fetch(e))
            }
        };

        let (request, now_idle) = {
            let mut state = self.lock_state();
            let request = state.pending.remove(&key);
            state.active = state.active.saturating_sub(1);
            metrics::gauge!(telemetry::ACTIVE_FETCHES).set(state.active as f64);
            (request, state.active == 0)
        };

        if let Some(request) = request {
            let delivered = request.resolve(outcome);
            debug!(%key, delivered, "request resolved");
        }
        if now_idle {
            self.idle.notify_waiters();
        }
        self.wake.notify_one();
    }

    /// Write the cache through to persistence on the blocking pool.
    fn persist(self: &Arc<Self>) {
        if self.persistence.is_none() {
            return;
        }
        let inner = Arc::clone(self);
        tokio::task::spawn_blocking(move || inner.save_snapshot());
    }

    /// Save the current cache contents unless a newer snapshot is already
    /// on disk. Serialized by `saved_generation`.
    fn save_snapshot(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let mut saved = self
            .saved_generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.cache.snapshot();
        if snapshot.generation <= *saved {
            return;
        }
        match persistence.save(&snapshot.entries) {
            Ok(()) => *saved = snapshot.generation,
            Err(e) => {
                metrics::counter!(telemetry::PERSIST_FAILURES_TOTAL).increment(1);
                warn!(error = %e, "failed to persist cache");
            }
        }
    }
}

/// Periodically, and whenever woken, run an admission pass.
///
/// Holds only a weak reference so an abandoned scheduler does not keep the
/// task alive; it exits on shutdown or once the scheduler is dropped.
async fn run_drain_loop(
    inner: Weak<Inner>,
    wake: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = wake.notified() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
        let Some(strong) = inner.upgrade() else {
            break;
        };
        strong.admit();
    }
    debug!("drain task stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
