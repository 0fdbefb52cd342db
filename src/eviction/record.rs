//! Record Module
//!
//! Defines the versioned entry stored for each resident key.

// == Record ==
/// A single resident cache entry.
///
/// Only [`Record::touch`] changes a record after creation, and it never
/// moves `inserted_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<K, V> {
    /// The key this record is stored under
    pub key: K,
    /// The stored value
    pub value: V,
    /// Insertion timestamp (clock milliseconds), fixed for the record's life
    pub inserted_at: u64,
    /// Last access timestamp, the LRU priority
    pub accessed_at: u64,
    /// Number of accesses including the insert, the LFU priority
    pub access_count: u64,
}

impl<K, V> Record<K, V> {
    // == Constructor ==
    /// Creates a fresh record inserted at `now`.
    pub fn new(key: K, value: V, now: u64) -> Self {
        Self {
            key,
            value,
            inserted_at: now,
            accessed_at: now,
            access_count: 1,
        }
    }

    // == Touch ==
    /// Records a successful read at `now`.
    pub fn touch(&mut self, now: u64) {
        self.accessed_at = now;
        self.access_count = self.access_count.saturating_add(1);
    }

    // == Is Expired ==
    /// Checks whether `ttl_ms` has fully elapsed since insertion.
    ///
    /// Boundary condition: an entry whose age equals the TTL is expired.
    pub fn is_expired(&self, now: u64, ttl_ms: u64) -> bool {
        now.saturating_sub(self.inserted_at) >= ttl_ms
    }
}
