use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::engine::Shared;
use crate::types::{JobOutcome, UnitOfWork};

/// One entry on the execution queue.
///
/// `Run` carries only identity plus the callable: the registry stays the
/// source of truth, and workers re-check it before running so entries for
/// removed jobs are dropped instead of executed stale. `Shutdown` is the
/// sentinel: one per worker is pushed by `stop()`, and a worker that
/// receives one exits without consuming any more.
pub(crate) enum WorkItem {
    Run { job_id: String, work: UnitOfWork },
    Shutdown,
}

/// Launch `count` worker tasks over a shared queue receiver.
///
/// The receiver sits behind an async mutex; one idle worker at a time holds
/// it while blocked on dequeue (under `idle_poll` so the lock rotates), and
/// releases it before executing, so distinct jobs run concurrently across
/// workers while a single worker never runs two at once.
pub(crate) fn spawn_workers(
    count: usize,
    queue: mpsc::UnboundedReceiver<WorkItem>,
    shared: Arc<Shared>,
    idle_poll: Duration,
) -> Vec<JoinHandle<()>> {
    let queue = Arc::new(Mutex::new(queue));
    (0..count)
        .map(|worker| {
            let queue = Arc::clone(&queue);
            let shared = Arc::clone(&shared);
            tokio::spawn(worker_loop(worker, queue, shared, idle_poll))
        })
        .collect()
}

async fn worker_loop(
    worker: usize,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<WorkItem>>>,
    shared: Arc<Shared>,
    idle_poll: Duration,
) {
    tracing::debug!(worker, "worker started");
    loop {
        let item = {
            let mut rx = queue.lock().await;
            match tokio::time::timeout(idle_poll, rx.recv()).await {
                Ok(Some(item)) => item,
                // All senders dropped; the scheduler is gone.
                Ok(None) => break,
                // Idle; release the lock so the pool rotates.
                Err(_) => continue,
            }
        };
        match item {
            WorkItem::Shutdown => break,
            WorkItem::Run { job_id, work } => run_one(worker, &job_id, &work, &shared).await,
        }
    }
    tracing::debug!(worker, "worker exited");
}

/// Execute one dequeued job: re-check the registry, flip the queued record
/// to running, run the unit of work, and write the terminal record.
///
/// Nothing raised by the unit of work escapes this function: failures and
/// panics are captured into the history so a bad job can never take down a
/// worker or the driver.
async fn run_one(worker: usize, job_id: &str, work: &UnitOfWork, shared: &Shared) {
    if !shared.job_exists(job_id) {
        tracing::warn!(job_id, "dequeued entry for a removed job; dropping");
        return;
    }
    if !shared.history.mark_running(job_id, Utc::now()) {
        tracing::warn!(job_id, "no queued record for dequeued entry; dropping");
        return;
    }

    tracing::debug!(worker, job_id, "job started");
    let outcome = match AssertUnwindSafe(work()).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => JobOutcome::Failure(panic_message(panic.as_ref())),
    };
    match &outcome {
        JobOutcome::Success => tracing::info!(worker, job_id, "job succeeded"),
        JobOutcome::Failure(error) => tracing::error!(worker, job_id, %error, "job failed"),
    }
    shared.history.record_outcome(job_id, &outcome, Utc::now());
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("unit of work panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("unit of work panicked: {s}")
    } else {
        "unit of work panicked".to_string()
    }
}
