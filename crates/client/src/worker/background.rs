//! Tracked fire-and-forget tasks.
//!
//! Responses never wait on these; the owner can `settle` to let them finish
//! before it is retired.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;

#[derive(Clone, Default)]
pub struct BackgroundTasks {
    set: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `task` now; its completion is tracked but never awaited by the caller.
    ///
    /// Finished tasks are reaped here so the tracker stays bounded by the
    /// number of tasks actually running.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(finished) = set.try_join_next() {
            if let Err(e) = finished {
                tracing::warn!(error = %e, "background task failed");
            }
        }
        set.spawn(task);
    }

    /// Number of tasks not yet reaped.
    pub fn pending(&self) -> usize {
        self.set.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Wait until every tracked task, including ones spawned meanwhile, has finished.
    pub async fn settle(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.set.lock().unwrap_or_else(PoisonError::into_inner));
            if batch.is_empty() {
                return;
            }
            while let Some(joined) = batch.join_next().await {
                if let Err(e) = joined {
                    tracing::warn!(error = %e, "background task failed");
                }
            }
        }
    }
}
