use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::history::HistoryLog;
use crate::trigger::Trigger;
use crate::types::{ExecutionRecord, JobSummary, UnitOfWork};
use crate::worker::{spawn_workers, WorkItem};

/// Tuning knobs for a [`Scheduler`]. All plain scalars, typically mapped
/// from the host's environment configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of worker tasks pulling from the execution queue.
    pub workers: usize,
    /// History cap applied when `add_job` is called without one.
    pub default_max_history: usize,
    /// Tick loop poll resolution.
    pub tick_interval: Duration,
    /// How long `stop()` waits for workers before abandoning them.
    pub shutdown_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            workers: 4,
            default_max_history: 100,
            tick_interval: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// One registry row. The registry is the sole owner of a job's trigger
/// state; workers only ever see `(id, work)` pairs.
pub(crate) struct JobEntry {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) work: UnitOfWork,
    pub(crate) trigger: Trigger,
    pub(crate) max_history: usize,
    pub(crate) paused: bool,
    /// When the job is next due. `None` once the trigger is exhausted.
    pub(crate) next_fire: Option<DateTime<Utc>>,
}

/// State shared between the control handle, the tick loop, and the workers:
/// the job registry and the history log. The execution queue is the only
/// other hand-off point between tick loop and workers.
pub(crate) struct Shared {
    pub(crate) registry: Mutex<Vec<JobEntry>>,
    pub(crate) history: HistoryLog,
}

impl Shared {
    fn new() -> Self {
        Shared {
            registry: Mutex::new(Vec::new()),
            history: HistoryLog::default(),
        }
    }

    pub(crate) fn job_exists(&self, id: &str) -> bool {
        self.registry.lock().unwrap().iter().any(|j| j.id == id)
    }
}

/// Live resources of a started scheduler, torn down by `stop()`.
struct RunState {
    tick: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
    queue: mpsc::UnboundedSender<WorkItem>,
}

/// The scheduler driver: owns the job registry and history log, runs the
/// periodic tick loop, and manages the worker pool lifecycle.
///
/// The handle is cheap to clone and safe to use from any thread; there is no
/// process-global scheduler; construct one per host (or per test) and pass
/// it to whatever needs to query or control it.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
    config: SchedulerConfig,
    run: Arc<Mutex<Option<RunState>>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Scheduler {
            shared: Arc::new(Shared::new()),
            config,
            run: Arc::new(Mutex::new(None)),
        }
    }

    /// Register a job, replacing any existing job with the same id.
    ///
    /// Replacement keeps the registry position (the tick loop evaluates jobs
    /// in insertion order) and the id's execution history; it resets the
    /// paused flag and re-arms the trigger. Queued or in-flight instances of
    /// the replaced job run to completion.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTrigger`] when the trigger's
    /// parameters are out of range; the registry is left untouched.
    ///
    /// [`SchedulerError::InvalidTrigger`]: crate::SchedulerError::InvalidTrigger
    pub fn add_job(
        &self,
        id: &str,
        name: &str,
        work: UnitOfWork,
        trigger: Trigger,
        max_history: Option<usize>,
    ) -> Result<()> {
        trigger.validate()?;
        let now = Utc::now();
        let next_fire = trigger.first_fire(now);
        let max_history = max_history.unwrap_or(self.config.default_max_history).max(1);

        let mut registry = self.shared.registry.lock().unwrap();
        if let Some(existing) = registry.iter_mut().find(|j| j.id == id) {
            existing.name = name.to_string();
            existing.work = work;
            existing.trigger = trigger;
            existing.max_history = max_history;
            existing.paused = false;
            existing.next_fire = next_fire;
            tracing::info!(job_id = %id, "job replaced");
        } else {
            registry.push(JobEntry {
                id: id.to_string(),
                name: name.to_string(),
                work,
                trigger,
                max_history,
                paused: false,
                next_fire,
            });
            tracing::info!(job_id = %id, "job added");
        }
        Ok(())
    }

    /// Remove a job and discard its history. Returns whether it existed.
    ///
    /// Entries already on the execution queue are not retroactively
    /// cancelled; the worker's registry re-check drops them with a warning.
    pub fn remove_job(&self, id: &str) -> bool {
        let removed = {
            let mut registry = self.shared.registry.lock().unwrap();
            let before = registry.len();
            registry.retain(|j| j.id != id);
            registry.len() != before
        };
        if removed {
            self.shared.history.discard(id);
            tracing::info!(job_id = %id, "job removed");
        }
        removed
    }

    /// Stop the tick loop from enqueuing the job. Its trigger still advances
    /// while paused, so resuming never produces a backlog of missed fires.
    /// Returns `false` for an unknown id.
    pub fn pause_job(&self, id: &str) -> bool {
        self.set_paused(id, true)
    }

    /// Allow the tick loop to enqueue the job again. Returns `false` for an
    /// unknown id. A job parked by an exhausted one-shot trigger is resumed
    /// but has no next fire time, so it will not run again.
    pub fn resume_job(&self, id: &str) -> bool {
        self.set_paused(id, false)
    }

    fn set_paused(&self, id: &str, paused: bool) -> bool {
        let mut registry = self.shared.registry.lock().unwrap();
        let Some(job) = registry.iter_mut().find(|j| j.id == id) else {
            return false;
        };
        job.paused = paused;
        tracing::info!(job_id = %id, paused, "job pause state changed");
        true
    }

    /// Snapshot of all registered jobs in registration order.
    pub fn get_jobs(&self) -> Vec<JobSummary> {
        let registry = self.shared.registry.lock().unwrap();
        registry
            .iter()
            .map(|j| JobSummary {
                id: j.id.clone(),
                name: j.name.clone(),
                trigger: j.trigger.clone(),
                paused: j.paused,
                next_fire: j.next_fire,
                max_history: j.max_history,
            })
            .collect()
    }

    /// Snapshot of a job's execution history, oldest first. Empty for an
    /// unknown id, since "job already gone" is a normal race, not an error.
    pub fn get_history(&self, id: &str) -> Vec<ExecutionRecord> {
        self.shared.history.snapshot(id)
    }

    /// Whether the tick loop and worker pool are live.
    pub fn is_running(&self) -> bool {
        self.run.lock().unwrap().is_some()
    }

    /// Launch the tick loop and the worker pool.
    ///
    /// Idempotent: calling `start()` while already running is a no-op. Must
    /// be called from within a tokio runtime.
    pub fn start(&self) {
        let mut run = self.run.lock().unwrap();
        if run.is_some() {
            tracing::debug!("scheduler already running; start ignored");
            return;
        }

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker_count = self.config.workers.max(1);

        let workers = spawn_workers(
            worker_count,
            queue_rx,
            Arc::clone(&self.shared),
            self.config.tick_interval,
        );
        let tick = tokio::spawn(tick_loop(
            Arc::clone(&self.shared),
            queue_tx.clone(),
            shutdown_rx,
            self.config.tick_interval,
        ));

        *run = Some(RunState {
            tick,
            workers,
            shutdown: shutdown_tx,
            queue: queue_tx,
        });
        tracing::info!(workers = worker_count, "scheduler started");
    }

    /// Stop the tick loop, drain the queue with one shutdown sentinel per
    /// worker, and wait for the pool to exit.
    ///
    /// An in-progress unit of work is never interrupted; if the pool does
    /// not drain within the configured grace period the remaining workers
    /// are abandoned and a warning is logged. A stopped scheduler can be
    /// started again.
    pub async fn stop(&self) {
        let state = { self.run.lock().unwrap().take() };
        let Some(state) = state else {
            tracing::debug!("scheduler not running; stop ignored");
            return;
        };

        let _ = state.shutdown.send(true);
        let drain = async {
            // Wait for the tick loop first: once it has exited, nothing can
            // enqueue work behind the sentinels.
            let _ = state.tick.await;
            for _ in 0..state.workers.len() {
                let _ = state.queue.send(WorkItem::Shutdown);
            }
            drop(state.queue);
            for worker in state.workers {
                let _ = worker.await;
            }
        };
        if tokio::time::timeout(self.config.shutdown_grace, drain)
            .await
            .is_err()
        {
            tracing::warn!(
                grace = ?self.config.shutdown_grace,
                "shutdown grace period elapsed; abandoning remaining workers"
            );
        }
        tracing::info!("scheduler stopped");
    }
}

/// The periodic driver task: evaluate triggers every `tick_interval` until
/// the shutdown signal flips.
async fn tick_loop(
    shared: Arc<Shared>,
    queue: mpsc::UnboundedSender<WorkItem>,
    mut shutdown: watch::Receiver<bool>,
    tick_interval: Duration,
) {
    tracing::debug!("tick loop started");
    let mut interval = tokio::time::interval(tick_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => tick(&shared, &queue, Utc::now()),
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!("tick loop exited");
}

/// One pass over the registry: enqueue every due, non-paused, non-coalesced
/// job in registration order and advance its trigger.
///
/// Triggers advance from the scheduled fire time (not the detection time) so
/// tick jitter never accumulates as drift, and they advance even for paused
/// or coalesced jobs so no backlog of missed fires builds up.
fn tick(shared: &Shared, queue: &mpsc::UnboundedSender<WorkItem>, now: DateTime<Utc>) {
    let mut registry = shared.registry.lock().unwrap();
    for job in registry.iter_mut() {
        let Some(due) = job.next_fire else { continue };
        if due > now {
            continue;
        }

        let next = job.trigger.next_fire_after(due, now);
        job.next_fire = next;

        if job.paused {
            continue;
        }
        if shared.history.has_inflight(&job.id) {
            tracing::debug!(job_id = %job.id, "previous instance still in flight; fire skipped");
            if next.is_none() {
                job.paused = true;
            }
            continue;
        }

        shared.history.append_queued(&job.id, now, job.max_history);
        if queue
            .send(WorkItem::Run {
                job_id: job.id.clone(),
                work: Arc::clone(&job.work),
            })
            .is_err()
        {
            tracing::warn!(job_id = %job.id, "execution queue closed; fire dropped");
            continue;
        }
        tracing::debug!(job_id = %job.id, "job enqueued");

        if next.is_none() {
            // One-shot trigger exhausted: park the job instead of dropping
            // it so its history stays readable.
            job.paused = true;
            tracing::info!(job_id = %job.id, "one-shot trigger exhausted; job parked");
        }
    }
}
