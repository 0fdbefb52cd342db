//! Lane Module
//!
//! A single-worker FIFO queue: one OS thread draining one bounded channel.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::handle::{TaskHandle, TaskOutcome};
use crate::error::{CacheError, Result};

/// Unit of work a lane runs. Never unwinds: panics are caught inside.
type Job = Box<dyn FnOnce() + Send + 'static>;

pub(crate) enum LaneMessage {
    Run(Job),
    /// Stop accepting work; everything already queued still runs
    Drain,
}

// == Lane ==
pub(crate) struct Lane {
    index: usize,
    sender: mpsc::Sender<LaneMessage>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Lane {
    /// Spawns the worker thread for lane `index`.
    pub(crate) fn spawn(index: usize, queue_depth: usize) -> Result<Self> {
        let (sender, receiver) = mpsc::channel(queue_depth);

        let worker = thread::Builder::new()
            .name(format!("cache-lane-{index}"))
            .spawn(move || run_lane(index, receiver))
            .map_err(|e| CacheError::Internal(format!("failed to spawn lane {index}: {e}")))?;

        Ok(Self {
            index,
            sender,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    // == Enqueue ==
    /// Queues `task`, waiting for room if the lane is saturated.
    pub(crate) async fn enqueue<T, F>(&self, task: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<TaskOutcome<T>>();
        let lane = self.index;

        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(task)).map_err(panic_message);
            if let Err(message) = &outcome {
                warn!(lane, %message, "lane task panicked");
            }
            // The caller may have stopped waiting
            let _ = tx.send(outcome);
        });

        self.sender
            .send(LaneMessage::Run(job))
            .await
            .map_err(|_| CacheError::ExecutorShutdown)?;

        Ok(TaskHandle::new(lane, rx))
    }

    /// Asks the worker to finish its queue and exit.
    pub(crate) async fn drain(&self) {
        // Already closed means the worker is gone or draining
        let _ = self.sender.send(LaneMessage::Drain).await;
    }

    pub(crate) fn take_worker(&self) -> Option<JoinHandle<()>> {
        self.worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

// == Worker Loop ==
fn run_lane(index: usize, mut receiver: mpsc::Receiver<LaneMessage>) {
    debug!(lane = index, "lane worker started");

    let mut executed: u64 = 0;
    while let Some(message) = receiver.blocking_recv() {
        match message {
            LaneMessage::Run(job) => {
                job();
                executed += 1;
            }
            // Buffered jobs are still delivered after close
            LaneMessage::Drain => receiver.close(),
        }
    }

    debug!(lane = index, executed, "lane worker stopped");
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
