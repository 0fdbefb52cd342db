//! Configuration Module
//!
//! Handles loading and managing cache and server configuration from
//! environment variables.

use std::env;
use std::str::FromStr;

use crate::eviction::EvictionPolicy;

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of resident entries
    pub capacity: usize,
    /// Entry lifetime in milliseconds, measured from insertion
    pub ttl_ms: u64,
    /// Eviction policy used when the cache is full
    pub eviction_policy: EvictionPolicy,
    /// Number of execution lanes
    pub lanes: usize,
    /// Bounded queue length per lane
    pub queue_depth: usize,
    /// Per-operation wait limit in milliseconds, 0 disables it
    pub op_timeout_ms: u64,
    /// Extra attempts for a failed write-through
    pub write_through_retries: u32,
    /// Delay between write-through attempts in milliseconds
    pub write_through_backoff_ms: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum resident entries (default: 1000)
    /// - `CACHE_TTL_MS` - Entry TTL in milliseconds (default: 300000)
    /// - `EVICTION_POLICY` - `lru` or `lfu` (default: lru)
    /// - `LANE_COUNT` - Execution lanes (default: 5)
    /// - `LANE_QUEUE_DEPTH` - Queue length per lane (default: 1024)
    /// - `OP_TIMEOUT_MS` - Operation wait limit, 0 = none (default: 5000)
    /// - `WRITE_THROUGH_RETRIES` - Store retry attempts (default: 2)
    /// - `WRITE_THROUGH_BACKOFF_MS` - Delay between retries (default: 50)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: env_or("CACHE_CAPACITY", defaults.capacity),
            ttl_ms: env_or("CACHE_TTL_MS", defaults.ttl_ms),
            eviction_policy: env_or("EVICTION_POLICY", defaults.eviction_policy),
            lanes: env_or("LANE_COUNT", defaults.lanes),
            queue_depth: env_or("LANE_QUEUE_DEPTH", defaults.queue_depth),
            op_timeout_ms: env_or("OP_TIMEOUT_MS", defaults.op_timeout_ms),
            write_through_retries: env_or("WRITE_THROUGH_RETRIES", defaults.write_through_retries),
            write_through_backoff_ms: env_or(
                "WRITE_THROUGH_BACKOFF_MS",
                defaults.write_through_backoff_ms,
            ),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl_ms: 300_000,
            eviction_policy: EvictionPolicy::Lru,
            lanes: 5,
            queue_depth: 1024,
            op_timeout_ms: 5000,
            write_through_retries: 2,
            write_through_backoff_ms: 50,
            server_port: 3000,
        }
    }
}
