//! Eviction Strategy Module
//!
//! Record table plus priority index, driven by a [`Ranking`].

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, trace};

use super::clock::Clock;
use super::policy::{EvictionPolicy, Lfu, Lru, Ranking};
use super::priority::PriorityIndex;
use super::record::Record;
use super::stats::CacheStats;

// == Eviction Strategy Trait ==
/// Bounded key-value engine with lazy TTL expiry.
///
/// Implementations are not internally synchronised; callers serialise
/// access (the cache does so through its lanes and a mutex).
pub trait EvictionStrategy<K, V>: Send {
    /// Returns the value for `key`, refreshing its priority.
    ///
    /// Absent and expired keys both return `None`; an expired entry is
    /// dropped on discovery.
    fn get(&mut self, key: &K) -> Option<V>;

    /// Inserts or replaces `key`, returning the key evicted to make room.
    fn put(&mut self, key: K, value: V) -> Option<K>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;

    fn policy(&self) -> EvictionPolicy;

    fn stats(&self) -> CacheStats;
}

// == Priority Strategy ==
/// Generic strategy; the [`Ranking`] decides what "least" means.
#[derive(Debug)]
pub struct PriorityStrategy<K, V, R: Ranking> {
    /// Live records, one per key
    records: HashMap<K, Record<K, V>>,
    /// Every live key, filed under its record's priority
    index: PriorityIndex<R::Priority, K>,
    stats: CacheStats,
    ttl_ms: u64,
    capacity: usize,
    clock: Arc<dyn Clock>,
    _ranking: PhantomData<R>,
}

/// Evicts the least recently used entry.
pub type LruStrategy<K, V> = PriorityStrategy<K, V, Lru>;

/// Evicts the least frequently used entry.
pub type LfuStrategy<K, V> = PriorityStrategy<K, V, Lfu>;

impl<K, V, R> PriorityStrategy<K, V, R>
where
    K: Eq + Hash + Clone + Debug,
    R: Ranking,
{
    // == Constructor ==
    /// Creates an empty strategy. A zero capacity is clamped to 1.
    pub fn new(ttl_ms: u64, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: HashMap::new(),
            index: PriorityIndex::new(),
            stats: CacheStats::new(),
            ttl_ms,
            capacity: capacity.max(1),
            clock,
            _ranking: PhantomData,
        }
    }

    fn remove_record(&mut self, key: &K) -> Option<Record<K, V>> {
        let record = self.records.remove(key)?;
        self.index.remove(key);
        Some(record)
    }

    fn evict_one(&mut self) -> Option<K> {
        let (victim, priority) = self.index.pop_min()?;
        self.records.remove(&victim);
        self.stats.record_eviction();
        debug!(key = ?victim, ?priority, policy = R::POLICY.as_str(), "evicted entry");
        Some(victim)
    }

    /// Keys in the order they would be evicted.
    pub fn eviction_order(&self) -> Vec<K> {
        self.index.eviction_order()
    }

    /// Resident keys whose index slot disagrees with their record.
    #[cfg(test)]
    pub(crate) fn misfiled_keys(&self) -> Vec<K> {
        self.records
            .iter()
            .filter(|&(key, record)| {
                self.index.priority_of(key) != Some(R::priority(record))
            })
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl<K, V, R> EvictionStrategy<K, V> for PriorityStrategy<K, V, R>
where
    K: Eq + Hash + Clone + Debug + Send,
    V: Clone + Send,
    R: Ranking,
{
    fn get(&mut self, key: &K) -> Option<V> {
        let now = self.clock.now_ms();
        let expired = match self.records.get(key) {
            Some(record) => record.is_expired(now, self.ttl_ms),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            if let Some(record) = self.remove_record(key) {
                trace!(key = ?key, inserted_at = record.inserted_at, "dropped expired entry");
            }
            self.stats.record_expiration();
            self.stats.set_total_entries(self.records.len());
            return None;
        }

        let record = self.records.get_mut(key)?;
        // Clone before touching either table
        let value = record.value.clone();
        record.touch(now);
        self.index.reprioritize(key, R::priority(&*record));
        self.stats.record_hit();
        Some(value)
    }

    fn put(&mut self, key: K, value: V) -> Option<K> {
        // Every key copy is made before the first mutation, so a panicking
        // `Clone` leaves the table and index in agreement
        let table_key = key.clone();
        let index_key = key.clone();
        self.remove_record(&key);

        let evicted = if self.records.len() >= self.capacity {
            self.evict_one()
        } else {
            None
        };

        let now = self.clock.now_ms();
        let record = Record::new(key, value, now);
        self.index.insert(index_key, R::priority(&record));
        self.records.insert(table_key, record);
        self.stats.set_total_entries(self.records.len());

        debug_assert_eq!(self.records.len(), self.index.len());
        debug_assert!(self.records.len() <= self.capacity);
        evicted
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn policy(&self) -> EvictionPolicy {
        R::POLICY
    }

    fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.records.len());
        stats
    }
}

impl EvictionPolicy {
    /// Builds the strategy implementing this policy.
    pub fn build<K, V>(
        self,
        ttl_ms: u64,
        capacity: usize,
        clock: Arc<dyn Clock>,
    ) -> Box<dyn EvictionStrategy<K, V>>
    where
        K: Eq + Hash + Clone + Debug + Send + 'static,
        V: Clone + Send + 'static,
    {
        match self {
            EvictionPolicy::Lru => Box::new(LruStrategy::new(ttl_ms, capacity, clock)),
            EvictionPolicy::Lfu => Box::new(LfuStrategy::new(ttl_ms, capacity, clock)),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::eviction::clock::ManualClock;
    use std::cell::Cell;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    const TTL: u64 = 10_000;

    thread_local! {
        /// Successful clones left before `Fragile::clone` panics
        static CLONE_BUDGET: Cell<Option<u32>> = const { Cell::new(None) };
    }

    /// Key or value whose `Clone` panics once the budget runs out.
    #[derive(Debug, PartialEq, Eq, Hash)]
    struct Fragile(u32);

    impl Clone for Fragile {
        fn clone(&self) -> Self {
            CLONE_BUDGET.with(|budget| match budget.get() {
                Some(0) => {
                    budget.set(None);
                    panic!("clone of {} failed", self.0);
                }
                Some(left) => budget.set(Some(left - 1)),
                None => {}
            });
            Fragile(self.0)
        }
    }

    fn fail_clone_after(successes: u32) {
        CLONE_BUDGET.with(|budget| budget.set(Some(successes)));
    }

    fn disarm_clone_failure() {
        CLONE_BUDGET.with(|budget| budget.set(None));
    }

    fn lru(capacity: usize) -> (LruStrategy<u32, &'static str>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        (LruStrategy::new(TTL, capacity, clock.clone()), clock)
    }

    fn lfu(capacity: usize) -> (LfuStrategy<u32, &'static str>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        (LfuStrategy::new(TTL, capacity, clock.clone()), clock)
    }

    #[test]
    fn test_put_and_get() {
        let (mut strategy, _) = lru(3);

        assert_eq!(strategy.put(1, "a"), None);
        assert_eq!(strategy.get(&1), Some("a"));
        assert_eq!(strategy.len(), 1);
    }

    #[test]
    fn test_lru_evicts_least_recently_touched() {
        let (mut strategy, clock) = lru(3);

        strategy.put(1, "a");
        clock.advance(1);
        strategy.put(2, "b");
        clock.advance(1);
        strategy.put(3, "c");
        clock.advance(1);
        strategy.get(&2);
        clock.advance(1);

        assert_eq!(strategy.put(4, "d"), Some(1));
        assert_eq!(strategy.get(&1), None);
        assert_eq!(strategy.get(&2), Some("b"));
        assert_eq!(strategy.get(&3), Some("c"));
        assert_eq!(strategy.get(&4), Some("d"));
    }

    #[test]
    fn test_lru_same_millisecond_falls_back_to_insertion_order() {
        // Clock never moves: every record shares one bucket
        let (mut strategy, _) = lru(3);

        strategy.put(1, "a");
        strategy.put(2, "b");
        strategy.put(3, "c");
        strategy.get(&1);

        assert_eq!(strategy.eviction_order(), vec![2, 3, 1]);
        assert_eq!(strategy.put(4, "d"), Some(2));
    }

    #[test]
    fn test_lfu_evicts_least_frequently_used() {
        let (mut strategy, _) = lfu(3);

        strategy.put(1, "a");
        strategy.put(2, "b");
        strategy.put(3, "c");
        strategy.get(&1);
        strategy.get(&1);
        strategy.get(&2);

        assert_eq!(strategy.put(4, "d"), Some(3));
        assert_eq!(strategy.get(&3), None);
        assert_eq!(strategy.get(&1), Some("a"));
        assert_eq!(strategy.get(&2), Some("b"));
    }

    #[test]
    fn test_lfu_tie_evicts_oldest_in_bucket() {
        let (mut strategy, _) = lfu(2);

        strategy.put(1, "a");
        strategy.put(2, "b");

        assert_eq!(strategy.put(3, "c"), Some(1));
    }

    #[test]
    fn test_overwrite_resets_priority() {
        let (mut strategy, _) = lfu(2);

        strategy.put(1, "a");
        strategy.get(&1);
        strategy.get(&1);
        strategy.put(2, "b");

        // Overwrite drops key 1 back to count 1, behind key 2
        strategy.put(1, "a2");
        assert_eq!(strategy.len(), 2);
        assert_eq!(strategy.put(3, "c"), Some(2));
        assert_eq!(strategy.get(&1), Some("a2"));
    }

    #[test]
    fn test_overwrite_at_capacity_evicts_nothing() {
        let (mut strategy, _) = lru(2);

        strategy.put(1, "a");
        strategy.put(2, "b");

        assert_eq!(strategy.put(2, "b2"), None);
        assert_eq!(strategy.len(), 2);
        assert_eq!(strategy.stats().evictions, 0);
    }

    #[test]
    fn test_ttl_lazy_expiry() {
        let clock = Arc::new(ManualClock::new(0));
        let mut strategy: LruStrategy<u32, &str> = LruStrategy::new(500, 3, clock.clone());

        strategy.put(1, "a");
        clock.advance(600);

        // Still resident until read
        assert_eq!(strategy.len(), 1);
        assert_eq!(strategy.get(&1), None);
        assert_eq!(strategy.len(), 0);

        // A fresh insert after expiry behaves like a first insert
        strategy.put(1, "a2");
        assert_eq!(strategy.get(&1), Some("a2"));

        let stats = strategy.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_reads_do_not_extend_ttl() {
        let clock = Arc::new(ManualClock::new(0));
        let mut strategy: LfuStrategy<u32, &str> = LfuStrategy::new(500, 3, clock.clone());

        strategy.put(1, "a");
        clock.advance(400);
        assert_eq!(strategy.get(&1), Some("a"));
        clock.advance(100);
        assert_eq!(strategy.get(&1), None);
    }

    #[test]
    fn test_expired_entry_is_evicted_by_priority_not_age() {
        let clock = Arc::new(ManualClock::new(0));
        let mut strategy: LfuStrategy<u32, &str> = LfuStrategy::new(500, 2, clock.clone());

        strategy.put(1, "a");
        strategy.get(&1);
        clock.advance(600);
        strategy.put(2, "b");

        // Key 1 is expired but has the higher count, so key 2 goes first
        assert_eq!(strategy.put(3, "c"), Some(2));
        assert_eq!(strategy.get(&1), None);
    }

    #[test]
    fn test_idempotent_miss() {
        let (mut strategy, _) = lru(3);
        strategy.put(1, "a");

        for _ in 0..5 {
            assert_eq!(strategy.get(&99), None);
        }

        assert_eq!(strategy.len(), 1);
        assert_eq!(strategy.stats().misses, 5);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let (mut strategy, _) = lru(0);

        strategy.put(1, "a");
        assert_eq!(strategy.put(2, "b"), Some(1));
        assert_eq!(strategy.capacity(), 1);
        assert_eq!(strategy.len(), 1);
    }

    #[test]
    fn test_build_from_policy() {
        let clock = Arc::new(ManualClock::new(0));
        let strategy = EvictionPolicy::Lfu.build::<String, String>(TTL, 10, clock);

        assert_eq!(strategy.policy(), EvictionPolicy::Lfu);
        assert_eq!(strategy.capacity(), 10);
        assert!(strategy.is_empty());
    }

    #[test]
    fn test_panicking_key_clone_keeps_capacity_bound() {
        // Fail each clone position a put can reach in turn
        for successes in 0..4 {
            let clock = Arc::new(ManualClock::new(0));
            let mut strategy: LruStrategy<Fragile, &str> =
                LruStrategy::new(TTL, 2, clock.clone());
            strategy.put(Fragile(1), "a");
            clock.advance(1);
            strategy.put(Fragile(2), "b");
            clock.advance(1);

            fail_clone_after(successes);
            let _ = catch_unwind(AssertUnwindSafe(|| strategy.put(Fragile(3), "c")));
            disarm_clone_failure();

            assert!(strategy.misfiled_keys().is_empty());
            assert_eq!(strategy.eviction_order().len(), strategy.len());

            for key in 4..10 {
                clock.advance(1);
                strategy.put(Fragile(key), "x");
                assert!(strategy.len() <= 2, "capacity exceeded after failed put");
                assert_eq!(strategy.eviction_order().len(), strategy.len());
            }
            assert_eq!(strategy.len(), 2);
        }
    }

    #[test]
    fn test_panicking_value_clone_keeps_entry() {
        let clock = Arc::new(ManualClock::new(0));
        let mut strategy: LruStrategy<u32, Fragile> = LruStrategy::new(TTL, 2, clock.clone());
        strategy.put(1, Fragile(10));
        clock.advance(1);

        fail_clone_after(0);
        let result = catch_unwind(AssertUnwindSafe(|| strategy.get(&1)));
        disarm_clone_failure();

        assert!(result.is_err());
        assert_eq!(strategy.len(), 1);
        assert_eq!(strategy.get(&1), Some(Fragile(10)));
        assert!(strategy.misfiled_keys().is_empty());
    }

    #[test]
    fn test_index_tracks_record_priority() {
        let (mut strategy, clock) = lfu(3);
        strategy.put(1, "a");
        strategy.put(2, "b");
        clock.advance(5);
        strategy.get(&1);
        strategy.get(&1);
        strategy.put(2, "b2");

        assert!(strategy.misfiled_keys().is_empty());
        assert_eq!(strategy.eviction_order(), vec![2, 1]);
    }
}
