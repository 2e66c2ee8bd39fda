use thiserror::Error;

/// Errors surfaced by the scheduler control API.
///
/// Execution failures inside a unit of work are deliberately absent: they are
/// caught at the worker boundary and recorded in the job's history, never
/// returned to the caller. "Job already gone" is likewise not an error;
/// `remove_job`/`pause_job`/`resume_job` report it as a `bool`.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The trigger's parameters are out of range (e.g. a zero interval or a
    /// malformed time of day). Rejected synchronously at `add_job` time.
    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
