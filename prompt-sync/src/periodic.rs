//! Background sync worker.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::session::{SessionInner, Trigger};

/// Handle to the background sync worker.
///
/// Dropping the handle stops the worker.
pub struct PeriodicSync {
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl fmt::Debug for PeriodicSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicSync")
            .field("shutdown", &self.shutdown.load(Ordering::Relaxed))
            .field("running", &self.is_running())
            .finish()
    }
}

impl PeriodicSync {
    pub(crate) fn spawn(session: Arc<SessionInner>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker = tokio::spawn(run_sync_loop(session, Arc::clone(&shutdown)));
        Self {
            shutdown,
            worker: Some(worker),
        }
    }

    /// Returns `true` while the worker task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Stops the worker and waits for it to exit.
    pub async fn stop(mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            worker.abort();
            let _ = worker.await;
        }
    }
}

impl Drop for PeriodicSync {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

async fn run_sync_loop(session: Arc<SessionInner>, shutdown: Arc<AtomicBool>) {
    let period = session.check_interval();
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while !shutdown.load(Ordering::Acquire) {
        interval.tick().await;
        if shutdown.load(Ordering::Acquire) || session.is_closed() {
            break;
        }
        if !session.sync_due().await {
            continue;
        }

        match session.refresh(Trigger::Periodic).await {
            Ok(outcome) => debug!(?outcome, "background sync finished"),
            Err(err) => debug!(error = %err, "background sync failed"),
        }
    }

    info!("background sync stopped");
}
