//! Sized Entry Store Module
//!
//! Bounded key-value store combining HashMap storage with FIFO eviction by
//! cumulative entry cost.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use tracing::trace;

use crate::cache::{CacheStats, FifoTracker, UnitWeigher, Weigher};
use crate::error::{CacheError, Result};

// == Store Key ==
/// Keys accepted by [`SizedEntryStore`].
///
/// `is_blank` marks the "no key" sentinel that `add` rejects.
pub trait StoreKey: Hash + Eq + Clone + fmt::Debug {
    fn is_blank(&self) -> bool {
        false
    }
}

impl StoreKey for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl StoreKey for u64 {}

#[derive(Debug)]
struct Resident<V> {
    value: V,
    cost: u64,
}

// == Sized Entry Store ==
/// Bounded store enforcing `current_size <= max_size`.
///
/// Entries are immutable once inserted: adding a resident key is a no-op.
/// Eviction is strict insertion order and reads never promote an entry.
/// An entry whose cost alone exceeds the budget is rejected with
/// [`CacheError::EntryTooLarge`] before anything is evicted.
pub struct SizedEntryStore<K, V, W = UnitWeigher> {
    entries: HashMap<K, Resident<V>>,
    order: FifoTracker<K>,
    weigher: W,
    current_size: u64,
    max_size: u64,
    stats: CacheStats,
}

impl<K, V, W> fmt::Debug for SizedEntryStore<K, V, W>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SizedEntryStore")
            .field("entries", &self.entries.len())
            .field("current_size", &self.current_size)
            .field("max_size", &self.max_size)
            .finish()
    }
}

impl<K, V> SizedEntryStore<K, V, UnitWeigher>
where
    K: StoreKey,
    V: Clone,
{
    /// Creates a count-bounded store (every entry costs 1).
    pub fn counted(max_entries: u64) -> Self {
        Self::new(max_entries, UnitWeigher)
    }
}

impl<K, V, W> SizedEntryStore<K, V, W>
where
    K: StoreKey,
    V: Clone,
    W: Weigher<K, V>,
{
    // == Constructor ==
    /// Creates a store with the given budget and weigher.
    pub fn new(max_size: u64, weigher: W) -> Self {
        Self {
            entries: HashMap::new(),
            order: FifoTracker::new(),
            weigher,
            current_size: 0,
            max_size,
            stats: CacheStats::new(),
        }
    }

    /// Creates a store with no budget yet. `add` fails until [`configure`]
    /// is called with a non-zero value.
    ///
    /// [`configure`]: SizedEntryStore::configure
    pub fn unconfigured(weigher: W) -> Self {
        Self::new(0, weigher)
    }

    // == Configure ==
    /// Sets the budget. Does not evict retroactively.
    pub fn configure(&mut self, max_size: u64) {
        self.max_size = max_size;
    }

    // == Get ==
    /// Returns a clone of the resident value, recording a hit or miss.
    ///
    /// Never changes eviction order.
    pub fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.entries.get(key) {
            Some(resident) => {
                self.stats.record_hit();
                Some(resident.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Returns true if the key is resident, without touching statistics.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    // == Add ==
    /// Inserts an entry, evicting the oldest entries until it fits.
    ///
    /// Returns `Ok(())` without replacing anything when the key is already
    /// resident.
    pub fn add(&mut self, key: K, value: V) -> Result<()> {
        if self.max_size == 0 {
            return Err(CacheError::Configuration(
                "store budget must be configured with a non-zero size before use".to_string(),
            ));
        }

        if key.is_blank() {
            return Err(CacheError::InvalidKey);
        }

        if self.entries.contains_key(&key) {
            trace!(?key, "add skipped, key already resident");
            return Ok(());
        }

        let cost = self.weigher.weigh(&key, &value);
        if cost > self.max_size {
            return Err(CacheError::EntryTooLarge {
                key: format!("{:?}", key),
                size: cost,
                max: self.max_size,
            });
        }

        while self.current_size + cost > self.max_size {
            let Some(oldest) = self.order.pop_oldest() else {
                break;
            };
            if let Some(evicted) = self.entries.remove(&oldest) {
                self.current_size -= evicted.cost;
                self.stats.record_eviction();
                trace!(key = ?oldest, cost = evicted.cost, "evicted");
            }
        }

        self.entries.insert(key.clone(), Resident { value, cost });
        self.order.push(key);
        self.current_size += cost;

        Ok(())
    }

    // == Clear ==
    /// Drops every entry. Statistics counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.current_size = 0;
    }

    // == Accessors ==
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resident keys from oldest to newest insertion.
    pub fn keys_oldest_first(&self) -> Vec<K> {
        self.order.iter().cloned().collect()
    }

    /// Returns current statistics with fresh occupancy gauges.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_occupancy(self.entries.len(), self.current_size, self.max_size);
        stats
    }
}
