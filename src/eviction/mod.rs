//! Eviction Module
//!
//! Bounded in-memory storage with LRU/LFU eviction and lazy TTL expiry.

mod clock;
mod policy;
mod priority;
mod record;
mod stats;
mod strategy;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use policy::{EvictionPolicy, Lfu, Lru, ParseEvictionPolicyError, Ranking};
pub use priority::PriorityIndex;
pub use record::Record;
pub use stats::CacheStats;
pub use strategy::{EvictionStrategy, LfuStrategy, LruStrategy, PriorityStrategy};
