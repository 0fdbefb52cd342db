//! Task Handle Module
//!
//! Future resolving to the outcome of one lane task.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{CacheError, Result};

/// What a lane sends back: the task's value or its panic message.
pub(crate) type TaskOutcome<T> = std::result::Result<T, String>;

// == Task Handle ==
/// Resolves once the lane has run the task.
///
/// Dropping the handle does not cancel the task; the lane still runs it in
/// queue order.
#[derive(Debug)]
pub struct TaskHandle<T> {
    lane: usize,
    receiver: oneshot::Receiver<TaskOutcome<T>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(lane: usize, receiver: oneshot::Receiver<TaskOutcome<T>>) -> Self {
        Self { lane, receiver }
    }

    /// Index of the lane the task was queued on.
    pub fn lane(&self) -> usize {
        self.lane
    }

    /// Waits at most `deadline` for the result.
    ///
    /// On timeout the caller gets [`CacheError::Timeout`]; the task itself
    /// keeps its place in the lane and still runs.
    pub async fn with_deadline(self, deadline: Duration) -> Result<T> {
        tokio::time::timeout(deadline, self)
            .await
            .map_err(|_| CacheError::Timeout(deadline))?
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let lane = self.lane;
        Pin::new(&mut self.receiver).poll(cx).map(|received| match received {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(CacheError::TaskFailed { lane, message }),
            Err(_) => Err(CacheError::TaskDropped { lane }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_resolves_value() {
        let (tx, rx) = oneshot::channel();
        let handle = TaskHandle::new(2, rx);
        tx.send(Ok(7)).unwrap();

        assert_eq!(handle.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_handle_reports_panic_message() {
        let (tx, rx) = oneshot::channel::<TaskOutcome<()>>();
        let handle = TaskHandle::new(1, rx);
        tx.send(Err("boom".to_string())).unwrap();

        match handle.await {
            Err(CacheError::TaskFailed { lane, message }) => {
                assert_eq!(lane, 1);
                assert_eq!(message, "boom");
            }
            other => panic!("expected TaskFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_reports_dropped_task() {
        let (tx, rx) = oneshot::channel::<TaskOutcome<u8>>();
        let handle = TaskHandle::new(0, rx);
        drop(tx);

        assert!(matches!(handle.await, Err(CacheError::TaskDropped { lane: 0 })));
    }

    #[tokio::test]
    async fn test_deadline_elapses() {
        let (_tx, rx) = oneshot::channel::<TaskOutcome<u8>>();
        let handle = TaskHandle::new(0, rx);

        let result = handle.with_deadline(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(CacheError::Timeout(_))));
    }
}
