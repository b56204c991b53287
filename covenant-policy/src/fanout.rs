//! Bounded fan-out of independent tasks with per-task results.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Errors produced by the fan-out.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FanOutError {
    /// The fan-out is closed and will not accept new tasks.
    #[error("fan-out closed")]
    Closed,
    /// The task panicked or was cancelled.
    #[error("fan-out task failed: {reason}")]
    Join {
        /// Join failure description.
        reason: String,
    },
}

/// Result alias for fan-out operations.
pub type FanOutResult<T> = Result<T, FanOutError>;

/// Spawns tasks on the runtime while capping how many run at once.
#[derive(Debug, Clone)]
pub struct FanOut {
    semaphore: Arc<Semaphore>,
    closed: Arc<AtomicBool>,
    limit: NonZeroUsize,
}

impl FanOut {
    /// Creates a fan-out running at most `limit` tasks concurrently.
    #[must_use]
    pub fn new(limit: NonZeroUsize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit.get())),
            closed: Arc::new(AtomicBool::new(false)),
            limit,
        }
    }

    /// Returns the concurrency limit.
    #[must_use]
    pub const fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Rejects new tasks and wakes tasks still waiting for a permit.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.semaphore.close();
    }

    /// Spawns a future once a permit is available.
    ///
    /// # Errors
    ///
    /// Returns [`FanOutError::Closed`] when the fan-out is already closed.
    /// A task still waiting for its permit when the fan-out closes resolves
    /// to [`FanOutError::Closed`] instead of running.
    pub fn spawn<F, T>(&self, future: F) -> FanOutResult<JoinHandle<FanOutResult<T>>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_closed() {
            return Err(FanOutError::Closed);
        }

        let semaphore = Arc::clone(&self.semaphore);
        Ok(tokio::spawn(async move {
            let permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| FanOutError::Closed)?;
            let output = future.await;
            drop(permit);
            Ok(output)
        }))
    }

    /// Runs every future, returning one result per input in input order.
    ///
    /// A failing task never prevents the others from being collected.
    pub async fn join_all<I, F, T>(&self, futures: I) -> Vec<FanOutResult<T>>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = futures.into_iter().map(|f| self.spawn(f)).collect();
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle {
                Ok(handle) => handle.await.unwrap_or_else(|err| {
                    Err(FanOutError::Join {
                        reason: err.to_string(),
                    })
                }),
                Err(err) => Err(err),
            });
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn respects_limit() {
        let fanout = FanOut::new(NonZeroUsize::new(2).unwrap());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks = (0..5).map(|_| {
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            async move {
                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        });
        let results = fanout.join_all(tasks).await;

        assert_eq!(results.len(), 5);
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(max_seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_isolated_and_ordered() {
        let fanout = FanOut::new(NonZeroUsize::new(4).unwrap());
        let tasks = (0..4_u32).map(|i| async move {
            assert!(i != 2, "task two fails");
            i * 10
        });
        let results = fanout.join_all(tasks).await;

        assert_eq!(results[0], Ok(0));
        assert_eq!(results[1], Ok(10));
        assert!(matches!(results[2], Err(FanOutError::Join { .. })));
        assert_eq!(results[3], Ok(30));
    }

    #[tokio::test]
    async fn closed_fanout_rejects_tasks() {
        let fanout = FanOut::new(NonZeroUsize::new(1).unwrap());
        fanout.close();
        assert!(fanout.is_closed());
        let results = fanout.join_all([async {}]).await;
        assert_eq!(results, vec![Err(FanOutError::Closed)]);
    }
}
