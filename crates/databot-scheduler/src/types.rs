use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::trigger::Trigger;

/// Outcome reported by a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failure(String),
}

impl JobOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        JobOutcome::Failure(message.into())
    }
}

/// The zero-argument callable a job executes.
///
/// The scheduler never inspects what the work does; it only awaits the
/// returned future and records the [`JobOutcome`]. The callable must not
/// call back into the scheduler for its own job id.
pub type UnitOfWork = Arc<dyn Fn() -> BoxFuture<'static, JobOutcome> + Send + Sync>;

/// Lifecycle state of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Placed on the execution queue by the tick loop.
    Queued,
    /// Picked up by a worker.
    Running,
    /// The unit of work reported success.
    Succeeded,
    /// The unit of work reported failure or panicked.
    Failed,
}

impl ExecutionStatus {
    /// Whether the attempt has finished (successfully or not).
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Succeeded | ExecutionStatus::Failed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Queued => "queued",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Succeeded => "succeeded",
            ExecutionStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One row of a job's bounded execution history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// When the tick loop placed this attempt on the queue.
    pub enqueued_at: DateTime<Utc>,
    pub status: ExecutionStatus,
    /// Set when a worker dequeues the attempt.
    pub started_at: Option<DateTime<Utc>>,
    /// Set together with the terminal status.
    pub finished_at: Option<DateTime<Utc>>,
    /// Wall-clock execution time in milliseconds, set with the terminal status.
    pub duration_ms: Option<i64>,
    /// Failure description when `status` is `Failed`.
    pub error: Option<String>,
}

impl ExecutionRecord {
    pub(crate) fn queued(enqueued_at: DateTime<Utc>) -> Self {
        ExecutionRecord {
            enqueued_at,
            status: ExecutionStatus::Queued,
            started_at: None,
            finished_at: None,
            duration_ms: None,
            error: None,
        }
    }
}

/// Snapshot of one registered job, safe to hand to callers.
///
/// Copied out of the registry under its lock; holding one never observes
/// later mutations by the tick loop.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: String,
    pub name: String,
    pub trigger: Trigger,
    pub paused: bool,
    /// `None` once the trigger is exhausted.
    pub next_fire: Option<DateTime<Utc>>,
    pub max_history: usize,
}
