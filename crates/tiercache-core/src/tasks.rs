//! Background task queue
//!
//! Fire-and-forget work (revalidation, prefetch, forced maintenance) is
//! submitted here instead of being spawned loose. Nobody observes a task's
//! result; failures are logged inside the task itself. [`TaskQueue::flush`]
//! drains everything pending, which is how tests make background work
//! deterministic.

use parking_lot::Mutex;
use std::future::Future;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

#[derive(Default)]
pub struct TaskQueue {
    tasks: Mutex<JoinSet<()>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a task; it starts running immediately on the current runtime
    pub fn submit<F>(&self, label: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!("Submitting background task: {}", label);

        let mut tasks = self.tasks.lock();
        // Reap finished tasks so the set does not grow without bound
        while let Some(result) = tasks.try_join_next() {
            log_join_result(result);
        }
        tasks.spawn(task);
    }

    /// Number of tasks that have not been reaped yet
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Wait until every submitted task, including tasks submitted while
    /// flushing, has finished
    pub async fn flush(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.tasks.lock());
            if batch.is_empty() {
                break;
            }
            while let Some(result) = batch.join_next().await {
                log_join_result(result);
            }
        }
    }
}

fn log_join_result(result: Result<(), JoinError>) {
    if let Err(e) = result {
        warn!("Background task failed: {}", e);
    }
}
