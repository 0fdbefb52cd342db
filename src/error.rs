//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache and its HTTP surface.
///
/// A cache miss is not an error: lookups return `Ok(None)`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found (HTTP surface only)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid construction parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A lane task panicked while running
    #[error("Task on lane {lane} failed: {message}")]
    TaskFailed { lane: usize, message: String },

    /// A lane dropped the task without reporting a result
    #[error("Task on lane {lane} was dropped before completing")]
    TaskDropped { lane: usize },

    /// The caller stopped waiting; the lane still completes the work
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The executor no longer accepts work
    #[error("Executor has been shut down")]
    ExecutorShutdown,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == Store Error Enum ==
/// Failure reported by a backing store during write-through.
///
/// Never reaches cache callers; it is logged and counted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the write
    #[error("Store rejected write: {0}")]
    Rejected(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            CacheError::ExecutorShutdown => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::InvalidConfig(_)
            | CacheError::TaskFailed { .. }
            | CacheError::TaskDropped { .. }
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
