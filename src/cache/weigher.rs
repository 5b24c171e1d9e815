//! Entry weigher: the cost each resident entry charges against a budget.
//!
//! A store enforces `Σ weight(entry) ≤ max_size`. The default weigher charges
//! one unit per entry, so the budget becomes an entry count; the image caches
//! charge the decoded byte footprint instead.

/// Computes the cost of a cache entry.
pub trait Weigher<K, V>: Send + Sync {
    fn weigh(&self, key: &K, value: &V) -> u64;
}

/// Every entry costs exactly 1 unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitWeigher;

impl<K, V> Weigher<K, V> for UnitWeigher {
    #[inline]
    fn weigh(&self, _key: &K, _value: &V) -> u64 {
        1
    }
}

/// A weigher backed by a closure.
pub struct FnWeigher<F>(pub F);

impl<K, V, F> Weigher<K, V> for FnWeigher<F>
where
    F: Fn(&K, &V) -> u64 + Send + Sync,
{
    #[inline]
    fn weigh(&self, key: &K, value: &V) -> u64 {
        (self.0)(key, value)
    }
}
