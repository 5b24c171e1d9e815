//! In-memory image cache with a byte budget and FIFO eviction.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::cache::{CacheStats, SizedEntryStore, Weigher};
use crate::error::Result;
use crate::imaging::DecodedImage;

// == Memory Budget ==
/// How the byte budget of a [`MemoryImageCache`] is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum MemoryBudget {
    /// Fixed number of bytes.
    Bytes { bytes: u64 },
    /// Percentage of the runtime's maximum memory, fixed at construction.
    Percent { percent: u8, runtime_max_memory: u64 },
}

impl MemoryBudget {
    /// Resolves the budget in bytes.
    ///
    /// Percentages are floored: `runtime_max_memory * percent / 100` in
    /// integer arithmetic.
    pub fn resolve(&self) -> u64 {
        match *self {
            MemoryBudget::Bytes { bytes } => bytes,
            MemoryBudget::Percent {
                percent,
                runtime_max_memory,
            } => (u128::from(runtime_max_memory) * u128::from(percent) / 100) as u64,
        }
    }
}

/// Charges each image its pixel buffer size.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageWeigher;

impl Weigher<String, DecodedImage> for ImageWeigher {
    fn weigh(&self, _key: &String, image: &DecodedImage) -> u64 {
        image.byte_size()
    }
}

// == Memory Image Cache ==
/// Decoded images held in process memory.
///
/// All access goes through one lock so concurrent loads cannot corrupt the
/// size bookkeeping. The budget is fixed for the lifetime of the instance;
/// a new budget means a new cache.
pub struct MemoryImageCache {
    store: Mutex<SizedEntryStore<String, DecodedImage, ImageWeigher>>,
    budget: MemoryBudget,
}

impl MemoryImageCache {
    /// Creates a cache bounded by a fixed number of bytes.
    pub fn with_byte_budget(bytes: u64) -> Self {
        Self::from_budget(MemoryBudget::Bytes { bytes })
    }

    /// Creates a cache bounded by a percentage of `runtime_max_memory`.
    pub fn with_percent_budget(percent: u8, runtime_max_memory: u64) -> Self {
        Self::from_budget(MemoryBudget::Percent {
            percent,
            runtime_max_memory,
        })
    }

    pub fn from_budget(budget: MemoryBudget) -> Self {
        let max_size = budget.resolve();
        debug!(?budget, max_size, "memory image cache created");
        Self {
            store: Mutex::new(SizedEntryStore::new(max_size, ImageWeigher)),
            budget,
        }
    }

    // == Get ==
    /// Returns the cached image for `key`, if resident.
    pub fn get(&self, key: &str) -> Option<DecodedImage> {
        let hit = self.store.lock().get(key);
        trace!(key, hit = hit.is_some(), "memory lookup");
        hit
    }

    // == Add ==
    /// Caches `image` under `key`. A resident key keeps its first image.
    pub fn add(&self, key: &str, image: DecodedImage) -> Result<()> {
        let mut store = self.store.lock();
        store.add(key.to_string(), image)?;
        trace!(key, current_size = store.current_size(), "memory add");
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.lock().contains(key)
    }

    pub fn budget(&self) -> MemoryBudget {
        self.budget
    }

    pub fn max_size(&self) -> u64 {
        self.store.lock().max_size()
    }

    pub fn current_size(&self) -> u64 {
        self.store.lock().current_size()
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.lock().stats()
    }
}
