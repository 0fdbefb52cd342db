//! Eviction Policy Module
//!
//! Policy selection and the priority each policy ranks records by.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::record::Record;

/// Error returned when a policy name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEvictionPolicyError(String);

impl fmt::Display for ParseEvictionPolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid eviction policy: {}", self.0)
    }
}

impl std::error::Error for ParseEvictionPolicyError {}

// == Eviction Policy ==
/// Which entry a full cache gives up on insert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least Recently Used: evict the entry read or written longest ago
    #[default]
    Lru,
    /// Least Frequently Used: evict the entry with the fewest accesses
    Lfu,
}

impl EvictionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::Lfu => "lfu",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = ParseEvictionPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "lfu" => Ok(EvictionPolicy::Lfu),
            _ => Err(ParseEvictionPolicyError(s.to_string())),
        }
    }
}

// == Ranking ==
/// Derives a record's eviction priority. Lower priorities are evicted first.
pub trait Ranking: Send + 'static {
    type Priority: Ord + Copy + fmt::Debug + Send;

    const POLICY: EvictionPolicy;

    fn priority<K, V>(record: &Record<K, V>) -> Self::Priority;
}

/// Ranks records by last access time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lru;

impl Ranking for Lru {
    type Priority = u64;

    const POLICY: EvictionPolicy = EvictionPolicy::Lru;

    fn priority<K, V>(record: &Record<K, V>) -> u64 {
        record.accessed_at
    }
}

/// Ranks records by access count.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lfu;

impl Ranking for Lfu {
    type Priority = u64;

    const POLICY: EvictionPolicy = EvictionPolicy::Lfu;

    fn priority<K, V>(record: &Record<K, V>) -> u64 {
        record.access_count
    }
}
