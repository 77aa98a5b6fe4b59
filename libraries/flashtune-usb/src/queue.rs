//! Sequential write queue
//!
//! A single worker task drains an unbounded channel of boxed jobs, so jobs
//! run one at a time in the order `enqueue` was called. A failing or
//! panicking job resolves its own handle and the worker moves on.

use crate::error::{Result, UsbError};
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Handle to the write queue. Clones share the same worker.
#[derive(Debug, Clone)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl WriteQueue {
    /// Start the worker. Must be called from within a Tokio runtime.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx));
        Self { tx }
    }

    /// Submit a job.
    ///
    /// The job is queued before this returns, so submission order is call
    /// order even if the returned futures are awaited out of order (or not
    /// at all).
    pub fn enqueue<F, T>(&self, job: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();

        let wrapped: Job = Box::pin(async move {
            let result = match AssertUnwindSafe(job).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(panic = %message, "Write task panicked");
                    Err(UsbError::TaskPanicked(message))
                }
            };
            // The submitter may have stopped waiting
            let _ = done_tx.send(result);
        });

        let queued = self.tx.send(wrapped).is_ok();

        async move {
            if !queued {
                return Err(UsbError::QueueClosed);
            }
            done_rx.await.map_err(|_| UsbError::QueueClosed)?
        }
    }

    /// Wait until every job submitted before this call has finished
    pub async fn flush(&self) -> Result<()> {
        self.enqueue(async { Ok(()) }).await
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new()
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.recv().await {
        job.await;
    }
    debug!("Write queue closed");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let queue = WriteQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..20u64)
            .map(|i| {
                let log = Arc::clone(&log);
                queue.enqueue(async move {
                    // Earlier jobs sleep longer; order must still hold
                    tokio::time::sleep(Duration::from_millis(20 - i)).await;
                    log.lock().unwrap().push(i);
                    Ok(())
                })
            })
            .collect();

        // Await in reverse to show awaiting order does not matter
        for handle in handles.into_iter().rev() {
            handle.await.unwrap();
        }

        assert_eq!(*log.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_failure_does_not_break_chain() {
        let queue = WriteQueue::new();

        let failed = queue.enqueue(async { Err::<(), _>(UsbError::NotAttached) });
        let next = queue.enqueue(async { Ok(7) });

        assert!(matches!(failed.await, Err(UsbError::NotAttached)));
        assert_eq!(next.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let queue = WriteQueue::new();

        let panicked = queue.enqueue(async {
            if true {
                panic!("boom");
            }
            Ok(())
        });
        let next = queue.enqueue(async { Ok("still running") });

        match panicked.await {
            Err(UsbError::TaskPanicked(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected TaskPanicked, got {:?}", other),
        }
        assert_eq!(next.await.unwrap(), "still running");
    }

    #[tokio::test]
    async fn test_flush_waits_for_pending_jobs() {
        let queue = WriteQueue::new();
        let done = Arc::new(Mutex::new(false));

        let flag = Arc::clone(&done);
        let _unawaited = queue.enqueue(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            *flag.lock().unwrap() = true;
            Ok(())
        });

        queue.flush().await.unwrap();
        assert!(*done.lock().unwrap());
    }
}
