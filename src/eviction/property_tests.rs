//! Property-Based Tests for the Eviction Module
//!
//! Uses proptest to check the strategy invariants over arbitrary op sequences.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

use crate::eviction::{
    EvictionPolicy, EvictionStrategy, LfuStrategy, LruStrategy, ManualClock, PriorityStrategy,
    Ranking,
};

// == Test Configuration ==
const TEST_TTL_MS: u64 = 1_000;

// == Strategies ==
/// Small key space so sequences revisit keys
fn key_strategy() -> impl Strategy<Value = u8> {
    0u8..32
}

fn policy_strategy() -> impl Strategy<Value = EvictionPolicy> {
    prop_oneof![Just(EvictionPolicy::Lru), Just(EvictionPolicy::Lfu)]
}

#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: u8, value: u32 },
    Get { key: u8 },
    Tick { ms: u64 },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => (key_strategy(), any::<u32>()).prop_map(|(key, value)| CacheOp::Put { key, value }),
        4 => key_strategy().prop_map(|key| CacheOp::Get { key }),
        1 => (0u64..400).prop_map(|ms| CacheOp::Tick { ms }),
    ]
}

/// Checks that every resident key sits in the index exactly once, under
/// its record's current priority.
fn assert_index_consistent<R: Ranking>(
    strategy: &PriorityStrategy<u8, u32, R>,
) -> Result<(), TestCaseError> {
    let order = strategy.eviction_order();
    let unique: HashSet<_> = order.iter().collect();
    prop_assert_eq!(order.len(), strategy.len(), "index size differs from record table");
    prop_assert_eq!(unique.len(), order.len(), "key filed twice in the index");
    let misfiled = strategy.misfiled_keys();
    prop_assert!(misfiled.is_empty(), "keys filed under a stale priority: {:?}", misfiled);
    Ok(())
}

fn run_ops<R: Ranking>(
    mut strategy: PriorityStrategy<u8, u32, R>,
    clock: &ManualClock,
    ops: Vec<CacheOp>,
    capacity: usize,
) -> Result<(), TestCaseError> {
    for op in ops {
        match op {
            CacheOp::Put { key, value } => {
                let evicted = strategy.put(key, value);
                prop_assert!(evicted != Some(key), "put evicted its own key");
                prop_assert!(strategy.len() <= capacity);
            }
            CacheOp::Get { key } => {
                let before = strategy.len();
                let _ = strategy.get(&key);
                prop_assert!(strategy.len() <= before, "get grew the cache");
            }
            CacheOp::Tick { ms } => clock.advance(ms),
        }
        assert_index_consistent(&strategy)?;
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Capacity is never exceeded and the index mirrors the record table
    #[test]
    fn prop_capacity_and_index_invariants(
        capacity in 1usize..12,
        ops in prop::collection::vec(cache_op_strategy(), 1..200)
    ) {
        let clock = Arc::new(ManualClock::new(0));
        run_ops(LruStrategy::new(TEST_TTL_MS, capacity, clock.clone()), &clock, ops.clone(), capacity)?;

        let clock = Arc::new(ManualClock::new(0));
        run_ops(LfuStrategy::new(TEST_TTL_MS, capacity, clock.clone()), &clock, ops, capacity)?;
    }

    // The last value written is the one read back, until evicted or expired
    #[test]
    fn prop_overwrite_semantics(
        policy in policy_strategy(),
        key in key_strategy(),
        values in prop::collection::vec(any::<u32>(), 1..10)
    ) {
        let clock = Arc::new(ManualClock::new(0));
        let mut strategy = policy.build::<u8, u32>(TEST_TTL_MS, 4, clock);

        for value in &values {
            strategy.put(key, *value);
        }

        prop_assert_eq!(strategy.get(&key), values.last().copied());
        prop_assert_eq!(strategy.len(), 1);
    }

    // Reads of keys never inserted always miss and never change the size
    #[test]
    fn prop_idempotent_miss(
        policy in policy_strategy(),
        present in prop::collection::hash_set(0u8..16, 0..8),
        absent in 16u8..32,
        repeats in 1usize..20
    ) {
        let clock = Arc::new(ManualClock::new(0));
        let mut strategy = policy.build::<u8, u32>(TEST_TTL_MS, 16, clock);
        for key in &present {
            strategy.put(*key, u32::from(*key));
        }
        let size = strategy.len();

        for _ in 0..repeats {
            prop_assert_eq!(strategy.get(&absent), None);
            prop_assert_eq!(strategy.len(), size);
        }
    }

    // With distinct insert times and no reads, LRU evicts in insertion order
    #[test]
    fn prop_lru_eviction_order(
        keys in prop::collection::hash_set(key_strategy(), 2..10),
        new_key in 100u8..120
    ) {
        let keys: Vec<u8> = keys.into_iter().collect();
        let capacity = keys.len();
        let clock = Arc::new(ManualClock::new(0));
        let mut strategy = LruStrategy::new(TEST_TTL_MS, capacity, clock.clone());

        for key in &keys {
            strategy.put(*key, 0u32);
            clock.advance(1);
        }

        prop_assert_eq!(strategy.put(new_key, 1), Some(keys[0]));
        prop_assert_eq!(strategy.get(&keys[0]), None);
        for key in keys.iter().skip(1) {
            prop_assert!(strategy.get(key).is_some(), "key {} should survive", key);
        }
    }

    // A key read more often than every other resident key is never the victim
    #[test]
    fn prop_lfu_keeps_most_frequent(
        keys in prop::collection::hash_set(key_strategy(), 2..10),
        favourite_reads in 1usize..5,
        new_key in 100u8..120
    ) {
        let keys: Vec<u8> = keys.into_iter().collect();
        let favourite = keys[0];
        let clock = Arc::new(ManualClock::new(0));
        let mut strategy = LfuStrategy::new(TEST_TTL_MS, keys.len(), clock);

        for key in &keys {
            strategy.put(*key, 0u32);
        }
        for _ in 0..favourite_reads {
            strategy.get(&favourite);
        }

        let evicted = strategy.put(new_key, 1);
        prop_assert!(evicted.is_some());
        prop_assert_ne!(evicted, Some(favourite));
        prop_assert!(strategy.get(&favourite).is_some());
    }

    // Every entry is gone once its TTL has elapsed, whatever happened before
    #[test]
    fn prop_ttl_expiration_behavior(
        policy in policy_strategy(),
        keys in prop::collection::hash_set(key_strategy(), 1..8),
        reads in 0usize..5
    ) {
        let clock = Arc::new(ManualClock::new(0));
        let mut strategy = policy.build::<u8, u32>(TEST_TTL_MS, 16, clock.clone());

        for key in &keys {
            strategy.put(*key, 7);
        }
        for _ in 0..reads {
            for key in &keys {
                prop_assert_eq!(strategy.get(key), Some(7));
            }
            clock.advance(10);
        }

        clock.advance(TEST_TTL_MS);
        for key in &keys {
            prop_assert_eq!(strategy.get(key), None);
        }
        prop_assert!(strategy.is_empty());
        prop_assert_eq!(strategy.stats().expirations, keys.len() as u64);
    }
}
