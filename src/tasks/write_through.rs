//! Write-Through Task
//!
//! Forwards committed puts to the backing store without holding up the lane
//! or the caller.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::BackingStore;

// == Write Through ==
/// Spawns one store notification per committed put.
///
/// A failed notification is retried `retries` times, `backoff` apart, then
/// logged and counted. The cache's in-memory state is never rolled back.
pub struct WriteThrough<K, V> {
    store: Arc<dyn BackingStore<K, V>>,
    runtime: Handle,
    retries: u32,
    backoff: Duration,
    failures: Arc<AtomicU64>,
}

impl<K, V> WriteThrough<K, V>
where
    K: Clone + Debug + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Binds to `runtime`; notifications may then be dispatched from any
    /// thread, including lane workers.
    pub fn new(
        store: Arc<dyn BackingStore<K, V>>,
        runtime: Handle,
        retries: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            store,
            runtime,
            retries,
            backoff,
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of notifications that failed after every retry.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    // == Dispatch ==
    /// Spawns the notification for `key` and returns immediately.
    pub fn dispatch(&self, key: K, value: V) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let failures = Arc::clone(&self.failures);
        let retries = self.retries;
        let backoff = self.backoff;

        self.runtime.spawn(async move {
            let mut attempt = 0;
            loop {
                match store.load(key.clone(), value.clone()).await {
                    Ok(()) => {
                        debug!(key = ?key, attempt, "write-through stored");
                        return;
                    }
                    Err(e) if attempt < retries => {
                        attempt += 1;
                        debug!(key = ?key, attempt, error = %e, "write-through failed, retrying");
                        tokio::time::sleep(backoff).await;
                    }
                    Err(e) => {
                        failures.fetch_add(1, Ordering::Relaxed);
                        warn!(key = ?key, attempts = attempt + 1, error = %e, "write-through dropped");
                        return;
                    }
                }
            }
        })
    }
}

impl<K, V> Clone for WriteThrough<K, V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            runtime: self.runtime.clone(),
            retries: self.retries,
            backoff: self.backoff,
            failures: Arc::clone(&self.failures),
        }
    }
}
