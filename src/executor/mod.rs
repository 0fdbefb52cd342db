//! Key-Sharded Executor Module
//!
//! Serializes work per key while letting unrelated keys run in parallel.
//!
//! Each key hashes to exactly one lane. A lane is a bounded FIFO queue
//! drained by one dedicated thread, so two tasks for the same key always
//! run in submission order and never overlap. Keys that share a lane are
//! serialized too; keys on different lanes are unordered.

mod handle;
mod lane;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::error::{CacheError, Result};
use lane::Lane;

pub use handle::TaskHandle;

/// Default queue depth per lane.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

// == Sharded Executor ==
pub struct ShardedExecutor {
    lanes: Vec<Lane>,
    shut_down: AtomicBool,
}

impl ShardedExecutor {
    // == Constructor ==
    /// Starts `lanes` worker threads, each with a queue of `queue_depth`.
    pub fn new(lanes: usize, queue_depth: usize) -> Result<Self> {
        if lanes == 0 {
            return Err(CacheError::InvalidConfig(
                "lane count must be at least 1".to_string(),
            ));
        }
        if queue_depth == 0 {
            return Err(CacheError::InvalidConfig(
                "lane queue depth must be at least 1".to_string(),
            ));
        }

        let lanes = (0..lanes)
            .map(|index| Lane::spawn(index, queue_depth))
            .collect::<Result<Vec<_>>>()?;

        info!(lanes = lanes.len(), queue_depth, "sharded executor started");

        Ok(Self {
            lanes,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    // == Lane For ==
    /// Maps `key` to its lane: `hash(key) mod lanes`.
    ///
    /// The hasher is unseeded, so the mapping is stable for the life of the
    /// process.
    pub fn lane_for<K: Hash + ?Sized>(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.lanes.len() as u64) as usize
    }

    // == Submit ==
    /// Queues `task` on the lane owning `key`.
    ///
    /// Returns once the task is enqueued (waiting for room if the lane is
    /// full); await the returned handle for the result. A panic inside
    /// `task` fails only that handle.
    pub async fn submit<K, T, F>(&self, key: &K, task: F) -> Result<TaskHandle<T>>
    where
        K: Hash + ?Sized,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(CacheError::ExecutorShutdown);
        }

        self.lanes[self.lane_for(key)].enqueue(task).await
    }

    /// Queues a task that produces no value.
    pub async fn run_async<K, F>(&self, key: &K, task: F) -> Result<TaskHandle<()>>
    where
        K: Hash + ?Sized,
        F: FnOnce() + Send + 'static,
    {
        self.submit(key, task).await
    }

    // == Shutdown ==
    /// Stops accepting work and waits until every lane has run its queue.
    ///
    /// Idempotent; later calls return immediately.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        for lane in &self.lanes {
            lane.drain().await;
        }

        for lane in &self.lanes {
            let Some(worker) = lane.take_worker() else {
                continue;
            };
            match tokio::task::spawn_blocking(move || worker.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => warn!(lane = lane.index(), "lane worker panicked"),
                Err(e) => warn!(lane = lane.index(), error = %e, "failed to join lane worker"),
            }
        }

        info!("sharded executor drained");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ShardedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedExecutor")
            .field("lanes", &self.lanes.len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
