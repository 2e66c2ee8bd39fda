use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::types::{ExecutionRecord, ExecutionStatus, JobOutcome};

/// Bounded per-job execution history.
///
/// One mutex guards the whole id → ring map. Every write is a constant-time
/// append or in-place mutation, and the tick loop and workers must observe
/// each other's writes in order, so a single lock is the whole
/// single-writer-at-a-time discipline.
#[derive(Debug, Default)]
pub(crate) struct HistoryLog {
    inner: Mutex<HashMap<String, VecDeque<ExecutionRecord>>>,
}

impl HistoryLog {
    /// Append a `Queued` record for `job_id`, evicting the oldest records
    /// once the ring would exceed `max_history`.
    pub(crate) fn append_queued(&self, job_id: &str, enqueued_at: DateTime<Utc>, max_history: usize) {
        let mut map = self.inner.lock().unwrap();
        let records = map.entry(job_id.to_string()).or_default();
        while records.len() >= max_history.max(1) {
            records.pop_front();
        }
        records.push_back(ExecutionRecord::queued(enqueued_at));
    }

    /// Whether `job_id` has an attempt that is still `Queued` or `Running`.
    ///
    /// The tick loop consults this to coalesce: while it returns `true`, no
    /// new instance of the job may be enqueued.
    pub(crate) fn has_inflight(&self, job_id: &str) -> bool {
        let map = self.inner.lock().unwrap();
        map.get(job_id)
            .is_some_and(|records| records.iter().any(|r| !r.status.is_terminal()))
    }

    /// Transition the most recent `Queued` record to `Running`.
    ///
    /// Returns `false` when no such record exists (the job was removed
    /// between enqueue and dequeue); the caller drops the work item.
    pub(crate) fn mark_running(&self, job_id: &str, started_at: DateTime<Utc>) -> bool {
        let mut map = self.inner.lock().unwrap();
        let Some(records) = map.get_mut(job_id) else {
            return false;
        };
        let Some(record) = records
            .iter_mut()
            .rev()
            .find(|r| r.status == ExecutionStatus::Queued)
        else {
            return false;
        };
        record.status = ExecutionStatus::Running;
        record.started_at = Some(started_at);
        true
    }

    /// Write the terminal state of the most recent `Running` record.
    pub(crate) fn record_outcome(
        &self,
        job_id: &str,
        outcome: &JobOutcome,
        finished_at: DateTime<Utc>,
    ) {
        let mut map = self.inner.lock().unwrap();
        let Some(record) = map.get_mut(job_id).and_then(|records| {
            records
                .iter_mut()
                .rev()
                .find(|r| r.status == ExecutionStatus::Running)
        }) else {
            tracing::warn!(job_id, "no running record to finish; outcome dropped");
            return;
        };
        record.finished_at = Some(finished_at);
        record.duration_ms = record
            .started_at
            .map(|started| (finished_at - started).num_milliseconds());
        match outcome {
            JobOutcome::Success => record.status = ExecutionStatus::Succeeded,
            JobOutcome::Failure(error) => {
                record.status = ExecutionStatus::Failed;
                record.error = Some(error.clone());
            }
        }
    }

    /// Snapshot copy of a job's history, oldest first. Empty for unknown ids.
    pub(crate) fn snapshot(&self, job_id: &str) -> Vec<ExecutionRecord> {
        let map = self.inner.lock().unwrap();
        map.get(job_id)
            .map(|records| records.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop a job's history entirely (used when the job is removed, so a
    /// re-added id starts a fresh log).
    pub(crate) fn discard(&self, job_id: &str) {
        self.inner.lock().unwrap().remove(job_id);
    }
}
