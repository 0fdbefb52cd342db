//! Cache Façade
//!
//! Public `get`/`put` API: each call runs on the lane owning its key, and
//! committed writes are forwarded to the backing store in the background.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{info, trace};

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::eviction::{CacheStats, Clock, EvictionPolicy, EvictionStrategy, MonotonicClock};
use crate::executor::{ShardedExecutor, TaskHandle, DEFAULT_QUEUE_DEPTH};
use crate::store::BackingStore;
use crate::tasks::WriteThrough;

type SharedStrategy<K, V> = Arc<Mutex<Box<dyn EvictionStrategy<K, V>>>>;

// == Cache Options ==
/// Construction parameters, fixed for the life of a cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOptions {
    pub policy: EvictionPolicy,
    /// Milliseconds after insertion at which an entry expires
    pub ttl_ms: u64,
    /// Maximum resident entries
    pub capacity: usize,
    /// Number of execution lanes
    pub lanes: usize,
    /// Bounded queue length per lane
    pub queue_depth: usize,
    /// How long `get`/`put` wait for their lane; `None` waits forever
    pub op_timeout: Option<Duration>,
    /// Extra attempts for a failed store notification
    pub write_through_retries: u32,
    pub write_through_backoff: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            policy: EvictionPolicy::Lru,
            ttl_ms: 300_000,
            capacity: 1000,
            lanes: 5,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            op_timeout: Some(Duration::from_secs(5)),
            write_through_retries: 2,
            write_through_backoff: Duration::from_millis(50),
        }
    }
}

impl From<&Config> for CacheOptions {
    fn from(config: &Config) -> Self {
        Self {
            policy: config.eviction_policy,
            ttl_ms: config.ttl_ms,
            capacity: config.capacity,
            lanes: config.lanes,
            queue_depth: config.queue_depth,
            op_timeout: (config.op_timeout_ms > 0)
                .then(|| Duration::from_millis(config.op_timeout_ms)),
            write_through_retries: config.write_through_retries,
            write_through_backoff: Duration::from_millis(config.write_through_backoff_ms),
        }
    }
}

// == Cache ==
/// Concurrent key-value cache with pluggable eviction and lazy TTL expiry.
///
/// Operations on the same key run in submission order on one lane and
/// never overlap; operations on keys in different lanes run in parallel.
/// The strategy is shared by all lanes behind a mutex held only for the
/// in-memory mutation.
pub struct Cache<K, V> {
    strategy: SharedStrategy<K, V>,
    executor: ShardedExecutor,
    write_through: WriteThrough<K, V>,
    op_timeout: Option<Duration>,
    policy: EvictionPolicy,
    capacity: usize,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache using the monotonic system clock.
    ///
    /// Must be called inside a tokio runtime; write-through notifications
    /// are spawned onto it.
    pub fn new(options: CacheOptions, store: Arc<dyn BackingStore<K, V>>) -> Result<Self> {
        Self::with_clock(options, store, Arc::new(MonotonicClock::new()))
    }

    /// Creates a cache reading time from `clock`.
    pub fn with_clock(
        options: CacheOptions,
        store: Arc<dyn BackingStore<K, V>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if options.capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity must be at least 1".to_string(),
            ));
        }
        let runtime = Handle::try_current().map_err(|_| {
            CacheError::InvalidConfig("cache must be created inside a tokio runtime".to_string())
        })?;

        let executor = ShardedExecutor::new(options.lanes, options.queue_depth)?;
        let strategy = options.policy.build(options.ttl_ms, options.capacity, clock);
        let write_through = WriteThrough::new(
            store,
            runtime,
            options.write_through_retries,
            options.write_through_backoff,
        );

        info!(
            policy = %options.policy,
            capacity = options.capacity,
            ttl_ms = options.ttl_ms,
            lanes = options.lanes,
            "cache initialized"
        );

        Ok(Self {
            strategy: Arc::new(Mutex::new(strategy)),
            executor,
            write_through,
            op_timeout: options.op_timeout,
            policy: options.policy,
            capacity: options.capacity,
        })
    }

    // == Get ==
    /// Returns the value for `key`, or `None` if absent or expired.
    pub async fn get(&self, key: K) -> Result<Option<V>> {
        let handle = self.submit_get(key).await?;
        self.wait(handle).await
    }

    /// Queues a read and returns without waiting for it to run.
    pub async fn submit_get(&self, key: K) -> Result<TaskHandle<Option<V>>> {
        let strategy = Arc::clone(&self.strategy);
        let lookup_key = key.clone();

        self.executor
            .submit(&key, move || {
                let value = lock(&strategy).get(&lookup_key);
                trace!(key = ?lookup_key, hit = value.is_some(), "get");
                value
            })
            .await
    }

    // == Put ==
    /// Inserts or replaces `key`.
    ///
    /// Completes once the in-memory cache reflects the write; the backing
    /// store is notified afterwards and may not be updated yet.
    pub async fn put(&self, key: K, value: V) -> Result<()> {
        let handle = self.submit_put(key, value).await?;
        self.wait(handle).await
    }

    /// Queues a write and returns without waiting for it to run.
    pub async fn submit_put(&self, key: K, value: V) -> Result<TaskHandle<()>> {
        let strategy = Arc::clone(&self.strategy);
        let write_through = self.write_through.clone();
        let lane_key = key.clone();

        self.executor
            .run_async(&lane_key, move || {
                let evicted = lock(&strategy).put(key.clone(), value.clone());
                trace!(key = ?key, evicted = ?evicted, "put");
                write_through.dispatch(key, value);
            })
            .await
    }

    async fn wait<T>(&self, handle: TaskHandle<T>) -> Result<T> {
        match self.op_timeout {
            Some(deadline) => handle.with_deadline(deadline).await,
            None => handle.await,
        }
    }

    // == Stats ==
    /// Current counters, including failed write-through notifications.
    pub fn stats(&self) -> CacheStats {
        let mut stats = lock(&self.strategy).stats();
        stats.write_through_failures = self.write_through.failures();
        stats
    }

    /// Resident entries, including expired entries not yet read.
    pub fn len(&self) -> usize {
        lock(&self.strategy).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn lane_count(&self) -> usize {
        self.executor.lane_count()
    }

    // == Shutdown ==
    /// Rejects new operations and waits for every queued one to finish.
    pub async fn shutdown(&self) {
        self.executor.shutdown().await;
        info!("cache shut down");
    }
}

impl<K, V> Debug for Cache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("policy", &self.policy)
            .field("capacity", &self.capacity)
            .field("executor", &self.executor)
            .finish()
    }
}

/// Locks the shared strategy, recovering it if a previous holder panicked.
///
/// Strategies make every key and value clone before their first table
/// mutation, so a holder that panicked in `Clone` left them consistent.
fn lock<K, V>(
    strategy: &Mutex<Box<dyn EvictionStrategy<K, V>>>,
) -> MutexGuard<'_, Box<dyn EvictionStrategy<K, V>>> {
    strategy
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
