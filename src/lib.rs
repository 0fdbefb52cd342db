//! Lane Cache - A concurrent key-value cache
//!
//! Provides LRU/LFU eviction with lazy TTL expiry. Every operation runs on
//! the execution lane owning its key, so operations on one key never
//! interleave while unrelated keys proceed in parallel.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod eviction;
pub mod executor;
pub mod models;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheOptions};
pub use config::Config;
pub use error::{CacheError, Result, StoreError};
pub use eviction::{CacheStats, EvictionPolicy};
pub use store::{BackingStore, MemoryStore, NoopStore};
