//! Backing Store Module
//!
//! The write-through sink notified after every committed put.

use std::collections::HashMap;
use std::hash::Hash;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;

// == Backing Store Trait ==
/// Persistent store the cache writes through to.
///
/// Calls happen off the lane that committed the write, after the in-memory
/// state is already updated. An error never rolls that state back.
#[async_trait]
pub trait BackingStore<K, V>: Send + Sync {
    /// Persists `value` under `key`.
    async fn load(&self, key: K, value: V) -> Result<(), StoreError>;
}

// == Noop Store ==
/// Accepts every write and keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

#[async_trait]
impl<K, V> BackingStore<K, V> for NoopStore
where
    K: Send + 'static,
    V: Send + 'static,
{
    async fn load(&self, _key: K, _value: V) -> Result<(), StoreError> {
        Ok(())
    }
}

// == Memory Store ==
/// Keeps the latest written value per key in a map.
#[derive(Debug, Default)]
pub struct MemoryStore<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> MemoryStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Last value written for `key`.
    pub async fn value(&self, key: &K) -> Option<V> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl<K, V> BackingStore<K, V> for MemoryStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    async fn load(&self, key: K, value: V) -> Result<(), StoreError> {
        self.entries.write().await.insert(key, value);
        Ok(())
    }
}
