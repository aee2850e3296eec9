//! In-flight request table.
//!
//! One [`PendingRequest`] per key. Callers that miss the cache while a
//! request for the same key is queued or running join its waiter list
//! instead of starting another fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::oneshot;

use crate::types::{CacheKey, FetchOptions, Metadata};
use crate::{HuginnError, Result};

/// Result delivered to every waiter of a pending request.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success(Arc<Metadata>),
    Failure(HuginnError),
}

impl Outcome {
    pub fn into_result(self) -> Result<Arc<Metadata>> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(err) => Err(err),
        }
    }
}

/// A deduplicated fetch shared by all current waiters for `key`.
pub(crate) struct PendingRequest {
    pub(crate) key: CacheKey,
    pub(crate) item_id: String,
    pub(crate) options: FetchOptions,
    pub(crate) enqueued_at: Instant,
    waiters: Vec<oneshot::Sender<Outcome>>,
}

impl PendingRequest {
    /// Create a request with its first waiter.
    pub(crate) fn new(
        key: CacheKey,
        item_id: String,
        options: FetchOptions,
    ) -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let request = Self {
            key,
            item_id,
            options,
            enqueued_at: Instant::now(),
            waiters: vec![tx],
        };
        (request, rx)
    }

    pub(crate) fn add_waiter(&mut self) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        self.waiters.push(tx);
        rx
    }

    pub(crate) fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// Deliver `outcome` to every waiter, in registration order.
    ///
    /// Returns how many waiters were still listening.
    pub(crate) fn resolve(self, outcome: Outcome) -> usize {
        let mut delivered = 0;
        for tx in self.waiters {
            // A closed receiver means the caller stopped waiting.
            if tx.send(outcome.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

#[derive(Default)]
pub(crate) struct PendingTable {
    requests: HashMap<CacheKey, PendingRequest>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register another waiter on an existing request, if there is one.
    pub(crate) fn join(&mut self, key: &CacheKey) -> Option<oneshot::Receiver<Outcome>> {
        self.requests.get_mut(key).map(PendingRequest::add_waiter)
    }

    pub(crate) fn insert(&mut self, request: PendingRequest) {
        debug_assert!(!self.requests.contains_key(&request.key));
        self.requests.insert(request.key.clone(), request);
    }

    pub(crate) fn get(&self, key: &CacheKey) -> Option<&PendingRequest> {
        self.requests.get(key)
    }

    pub(crate) fn remove(&mut self, key: &CacheKey) -> Option<PendingRequest> {
        self.requests.remove(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }
}
