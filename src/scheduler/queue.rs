//! FIFO of keys waiting for a dispatch slot.

use std::collections::{HashSet, VecDeque};

use crate::types::CacheKey;

/// Ordered queue in which each key appears at most once.
#[derive(Debug, Default)]
pub(crate) struct RequestQueue {
    order: VecDeque<CacheKey>,
    members: HashSet<CacheKey>,
}

impl RequestQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append `key`. Returns `false` if it was already queued.
    pub(crate) fn push(&mut self, key: CacheKey) -> bool {
        if !self.members.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        true
    }

    pub(crate) fn pop_front(&mut self) -> Option<CacheKey> {
        let key = self.order.pop_front()?;
        self.members.remove(&key);
        Some(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Remove and return every queued key, front first.
    pub(crate) fn drain(&mut self) -> Vec<CacheKey> {
        self.members.clear();
        self.order.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FetchOptions;

    fn key(id: &str) -> CacheKey {
        CacheKey::derive(id, &FetchOptions::default())
    }

    #[test]
    fn fifo_order() {
        let mut queue = RequestQueue::new();
        queue.push(key("a"));
        queue.push(key("b"));
        queue.push(key("c"));
        assert_eq!(queue.pop_front(), Some(key("a")));
        assert_eq!(queue.pop_front(), Some(key("b")));
        assert_eq!(queue.pop_front(), Some(key("c")));
        assert_eq!(queue.pop_front(), None);
    }

    #[test]
    fn duplicate_push_is_ignored() {
        let mut queue = RequestQueue::new();
        assert!(queue.push(key("a")));
        assert!(!queue.push(key("a")));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn key_can_be_requeued_after_pop() {
        let mut queue = RequestQueue::new();
        queue.push(key("a"));
        queue.pop_front();
        assert!(queue.push(key("a")));
    }

    #[test]
    fn drain_empties_queue() {
        let mut queue = RequestQueue::new();
        queue.push(key("a"));
        queue.push(key("b"));
        assert_eq!(queue.drain(), vec![key("a"), key("b")]);
        assert!(queue.is_empty());
        assert!(queue.push(key("a")));
    }
}
