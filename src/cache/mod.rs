//! Cache Module
//!
//! Size-bounded FIFO stores and the two image cache tiers built on them.

mod disk;
mod disk_entry;
mod fifo;
mod memory;
mod sized;
mod stats;
mod weigher;


// Re-export public types
pub use disk::{DiskCacheConfig, DiskImageCache};
pub use disk_entry::{file_name_for, DiskEntry, CACHE_FILE_EXTENSION};
pub use fifo::FifoTracker;
pub use memory::{ImageWeigher, MemoryBudget, MemoryImageCache};
pub use sized::{SizedEntryStore, StoreKey};
pub use stats::CacheStats;
pub use weigher::{FnWeigher, UnitWeigher, Weigher};
