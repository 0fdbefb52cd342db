//! Priority Index Module
//!
//! Ordered buckets of keys keyed by eviction priority.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

// == Priority Index ==
/// Maps a priority value to the keys currently holding it.
///
/// Buckets are ordered by priority; within a bucket keys are ordered by
/// insertion sequence, so the eviction victim is the oldest member of the
/// lowest bucket. Both lookups and removals are O(log n).
#[derive(Debug)]
pub struct PriorityIndex<P, K> {
    /// priority -> (insertion sequence -> key)
    buckets: BTreeMap<P, BTreeMap<u64, K>>,
    /// key -> (priority, insertion sequence)
    slots: HashMap<K, (P, u64)>,
    next_seq: u64,
}

impl<P, K> PriorityIndex<P, K>
where
    P: Ord + Copy,
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            buckets: BTreeMap::new(),
            slots: HashMap::new(),
            next_seq: 0,
        }
    }

    // == Insert ==
    /// Places `key` at the back of the `priority` bucket.
    ///
    /// A key already present is moved, never duplicated.
    pub fn insert(&mut self, key: K, priority: P) {
        // Clone first: a panicking clone must leave both maps untouched
        let stored = key.clone();
        self.remove(&key);

        let seq = self.next_seq;
        self.next_seq += 1;

        self.slots.insert(key, (priority, seq));
        self.buckets.entry(priority).or_default().insert(seq, stored);
    }

    // == Reprioritize ==
    /// Moves a present `key` to the back of the `priority` bucket.
    ///
    /// Reuses the stored key, so no clone is needed. Returns `false` if
    /// `key` is not indexed.
    pub fn reprioritize(&mut self, key: &K, priority: P) -> bool {
        let Some(slot) = self.slots.get_mut(key) else {
            return false;
        };
        let (current, seq) = *slot;
        let Some(bucket) = self.buckets.get_mut(&current) else {
            return false;
        };
        let Some(stored) = bucket.remove(&seq) else {
            return false;
        };
        if bucket.is_empty() {
            self.buckets.remove(&current);
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        *slot = (priority, seq);
        self.buckets.entry(priority).or_default().insert(seq, stored);
        true
    }

    // == Remove ==
    /// Removes `key` from its bucket, returning the priority it held.
    pub fn remove(&mut self, key: &K) -> Option<P> {
        let (priority, seq) = self.slots.remove(key)?;

        if let Some(bucket) = self.buckets.get_mut(&priority) {
            bucket.remove(&seq);
            if bucket.is_empty() {
                self.buckets.remove(&priority);
            }
        }

        Some(priority)
    }

    // == Pop Min ==
    /// Removes and returns the oldest key of the lowest-priority bucket.
    pub fn pop_min(&mut self) -> Option<(K, P)> {
        while let Some(mut lowest) = self.buckets.first_entry() {
            let priority = *lowest.key();
            let Some((_, key)) = lowest.get_mut().pop_first() else {
                // Empty buckets are never a victim
                lowest.remove();
                continue;
            };
            if lowest.get().is_empty() {
                lowest.remove();
            }

            self.slots.remove(&key);
            return Some((key, priority));
        }
        None
    }

    // == Peek Min ==
    /// Returns the next eviction victim without removing it.
    pub fn peek_min(&self) -> Option<&K> {
        self.buckets
            .values()
            .next()
            .and_then(|bucket| bucket.values().next())
    }

    /// Returns the priority `key` is currently filed under.
    pub fn priority_of(&self, key: &K) -> Option<P> {
        self.slots.get(key).map(|(priority, _)| *priority)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of distinct priority values in use.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// All keys, next victim first.
    pub fn eviction_order(&self) -> Vec<K> {
        self.buckets
            .values()
            .flat_map(|bucket| bucket.values().cloned())
            .collect()
    }
}

impl<P, K> Default for PriorityIndex<P, K>
where
    P: Ord + Copy,
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
