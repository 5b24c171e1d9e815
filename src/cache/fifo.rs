//! FIFO Tracker Module
//!
//! Insertion-order tracking for cache eviction.

use std::collections::VecDeque;

// == FIFO Tracker ==
/// Tracks insertion order for FIFO eviction.
///
/// Keys are stored in a VecDeque where:
/// - Front = Oldest insertion (next to evict)
/// - Back = Newest insertion
///
/// Reads never reorder the queue.
#[derive(Debug)]
pub struct FifoTracker<K> {
    order: VecDeque<K>,
}

impl<K> Default for FifoTracker<K> {
    fn default() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }
}

impl<K: PartialEq> FifoTracker<K> {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Push ==
    /// Records a newly inserted key as the newest entry.
    pub fn push(&mut self, key: K) {
        self.order.push_back(key);
    }

    // == Pop Oldest ==
    /// Returns and removes the oldest key, or None if empty.
    pub fn pop_oldest(&mut self) -> Option<K> {
        self.order.pop_front()
    }

    // == Peek Oldest ==
    /// Returns the oldest key without removing it.
    pub fn peek_oldest(&self) -> Option<&K> {
        self.order.front()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.order.iter().any(|k| k == key)
    }

    /// Iterates keys from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    /// Removes `key` wherever it sits. Returns false if it was not tracked.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.order.iter().position(|k| k == key) {
            Some(index) => {
                self.order.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_new() {
        let fifo: FifoTracker<String> = FifoTracker::new();
        assert!(fifo.is_empty());
        assert_eq!(fifo.len(), 0);
        assert_eq!(fifo.peek_oldest(), None);
    }

    #[test]
    fn test_fifo_pops_in_insertion_order() {
        let mut fifo = FifoTracker::new();
        fifo.push("a");
        fifo.push("b");
        fifo.push("c");

        assert_eq!(fifo.pop_oldest(), Some("a"));
        assert_eq!(fifo.pop_oldest(), Some("b"));
        assert_eq!(fifo.pop_oldest(), Some("c"));
        assert_eq!(fifo.pop_oldest(), None);
    }

    #[test]
    fn test_fifo_peek_does_not_remove() {
        let mut fifo = FifoTracker::new();
        fifo.push(1u64);
        fifo.push(2u64);

        assert_eq!(fifo.peek_oldest(), Some(&1));
        assert_eq!(fifo.len(), 2);
    }

    #[test]
    fn test_fifo_contains_and_clear() {
        let mut fifo = FifoTracker::new();
        fifo.push("x".to_string());

        assert!(fifo.contains(&"x".to_string()));
        assert!(!fifo.contains(&"y".to_string()));

        fifo.clear();
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_fifo_iter_oldest_first() {
        let mut fifo = FifoTracker::new();
        for k in ["d", "e", "f"] {
            fifo.push(k);
        }
        let keys: Vec<_> = fifo.iter().copied().collect();
        assert_eq!(keys, vec!["d", "e", "f"]);
    }

    #[test]
    fn test_fifo_remove_from_middle() {
        let mut fifo = FifoTracker::new();
        fifo.push(1u64);
        fifo.push(2u64);
        fifo.push(3u64);

        assert!(fifo.remove(&2));
        assert!(!fifo.remove(&2));
        assert_eq!(fifo.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
    }
}
