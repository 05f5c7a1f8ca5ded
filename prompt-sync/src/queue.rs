//! Ordered background writer for remote propagation.
//!
//! Writes run one at a time on a single worker task, in submission order.
//! The worker is spawned on first use so a session can be built outside a
//! runtime.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum QueueError {
    #[error("write queue closed")]
    Closed,
}

struct Channel {
    sender: Option<mpsc::UnboundedSender<Job>>,
    // Taken by the worker when it starts.
    receiver: Option<mpsc::UnboundedReceiver<Job>>,
}

pub(crate) struct WriteQueue {
    channel: Mutex<Channel>,
    closed: Arc<AtomicBool>,
}

impl WriteQueue {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            channel: Mutex::new(Channel {
                sender: Some(sender),
                receiver: Some(receiver),
            }),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Queues `write` behind every write submitted before it.
    ///
    /// The receiver yields the write's output, or an error when the queue
    /// closed before the write started. Dropping the receiver does not cancel
    /// the write.
    pub(crate) fn submit<F, T>(&self, write: F) -> Result<oneshot::Receiver<T>, QueueError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }

        let (done, output) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let _ = done.send(write.await);
        });

        let mut channel = self.channel.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(receiver) = channel.receiver.take() {
            tokio::spawn(run_writes(receiver, Arc::clone(&self.closed)));
        }
        channel
            .sender
            .as_ref()
            .ok_or(QueueError::Closed)?
            .send(job)
            .map_err(|_| QueueError::Closed)?;
        Ok(output)
    }

    /// Refuses new writes and drops queued ones. A write already running
    /// finishes.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sender
            .take();
    }
}

async fn run_writes(mut jobs: mpsc::UnboundedReceiver<Job>, closed: Arc<AtomicBool>) {
    while let Some(job) = jobs.recv().await {
        if closed.load(Ordering::Acquire) {
            debug!(dropped = jobs.len() + 1, "write queue closed; dropping queued writes");
            return;
        }
        job.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::Mutex as AsyncMutex;

    #[tokio::test]
    async fn writes_run_in_submission_order() {
        let queue = WriteQueue::new();
        let order = Arc::new(AsyncMutex::new(Vec::new()));

        let mut pending = Vec::new();
        for (index, delay) in [(0, 30), (1, 10), (2, 0)] {
            let order = Arc::clone(&order);
            pending.push(
                queue
                    .submit(async move {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        order.lock().await.push(index);
                        index
                    })
                    .unwrap(),
            );
        }

        for (expected, output) in pending.into_iter().enumerate() {
            assert_eq!(output.await.unwrap(), expected);
        }
        assert_eq!(*order.lock().await, [0, 1, 2]);
    }

    #[tokio::test]
    async fn closed_queue_refuses_writes() {
        let queue = WriteQueue::new();
        queue.close();
        assert_eq!(queue.submit(async {}).unwrap_err(), QueueError::Closed);
    }

    #[tokio::test]
    async fn close_drops_writes_that_have_not_started() {
        let queue = WriteQueue::new();
        let running = queue
            .submit(tokio::time::sleep(Duration::from_millis(50)))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let queued = queue.submit(async { 7 }).unwrap();
        queue.close();

        assert!(queued.await.is_err());
        assert_eq!(running.await, Ok(()));
    }

    #[tokio::test]
    async fn detached_write_still_runs() {
        let queue = WriteQueue::new();
        let ran = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&ran);
        drop(
            queue
                .submit(async move { flag.store(true, Ordering::SeqCst) })
                .unwrap(),
        );
        queue.submit(async {}).unwrap().await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }
}
