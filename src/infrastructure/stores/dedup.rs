//! Message Deduplicator
//!
//! At-least-once delivery guard keyed by (user, client message id). The
//! window is insertion-ordered and bounded: past 10,000 entries the oldest
//! half is evicted in one pass, trading exact LRU for O(1) amortized cost.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

/// Default bound on remembered message keys.
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Default)]
struct DedupWindow {
    order: VecDeque<String>,
    seen: HashSet<String>,
}

/// Bounded set of recently processed client message ids.
pub struct MessageDeduplicator {
    window: Mutex<DedupWindow>,
    capacity: usize,
}

impl MessageDeduplicator {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            window: Mutex::new(DedupWindow::default()),
            capacity,
        }
    }

    /// Record a (user, client message id) pair.
    ///
    /// Returns `false` when the pair was already seen; the caller must drop
    /// the send silently, with no error and no side effect.
    pub fn insert(&self, user_id: i64, client_message_id: &str) -> bool {
        let key = format!("{}:{}", user_id, client_message_id);
        let mut window = self.window.lock();

        if !window.seen.insert(key.clone()) {
            return false;
        }
        window.order.push_back(key);

        if window.order.len() > self.capacity {
            let evict = window.order.len() / 2;
            for _ in 0..evict {
                if let Some(old) = window.order.pop_front() {
                    window.seen.remove(&old);
                }
            }
        }

        true
    }

    pub fn len(&self) -> usize {
        self.window.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.lock().order.is_empty()
    }
}

impl Default for MessageDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_is_reported_exactly_once() {
        let dedup = MessageDeduplicator::new();
        assert!(dedup.insert(1, "msg-1"));
        assert!(!dedup.insert(1, "msg-1"));
    }

    #[test]
    fn keys_are_scoped_per_user() {
        let dedup = MessageDeduplicator::new();
        assert!(dedup.insert(1, "msg-1"));
        assert!(dedup.insert(2, "msg-1"));
    }

    #[test]
    fn overflow_evicts_the_oldest_half() {
        let dedup = MessageDeduplicator::with_capacity(10);
        for i in 0..11 {
            assert!(dedup.insert(1, &format!("msg-{}", i)));
        }

        // 11 entries tripped the bound; 5 oldest were dropped
        assert_eq!(dedup.len(), 6);
        assert!(dedup.insert(1, "msg-0"), "evicted id is acceptable again");
        assert!(!dedup.insert(1, "msg-10"), "recent id is still remembered");
    }
}
