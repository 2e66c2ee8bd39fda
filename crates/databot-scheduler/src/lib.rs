//! `databot-scheduler` — in-process recurring-job scheduler and execution engine.
//!
//! # Overview
//!
//! A [`Scheduler`] owns a registry of jobs (id + trigger + zero-argument unit
//! of work) and drives them with a single periodic tick loop: due jobs are
//! placed on a FIFO execution queue and picked up by a fixed pool of worker
//! tasks, which record every attempt in a bounded per-job history. Executions
//! of the same job never overlap: a fire that comes due while a previous
//! instance is still queued or running is skipped, not stacked.
//!
//! # Trigger variants
//!
//! | Variant    | Behaviour                                                |
//! |------------|----------------------------------------------------------|
//! | `Interval` | Repeat every fixed period; first fire at registration    |
//! | `DailyAt`  | Fire at HH:MM UTC every day                              |
//! | `WeeklyAt` | Fire at HH:MM UTC on a specific weekday (0 = Monday)     |
//! | `Immediate`| Single fire as soon as the driver observes the job       |
//!
//! Scheduling state lives in memory only; a restarted host re-registers its
//! jobs. The scheduler never inspects what a job does; the automation
//! pipeline behind the unit of work is the caller's business.

pub mod engine;
pub mod error;
pub mod trigger;
pub mod types;

mod history;
mod worker;

pub use engine::{Scheduler, SchedulerConfig};
pub use error::{Result, SchedulerError};
pub use trigger::Trigger;
pub use types::{ExecutionRecord, ExecutionStatus, JobOutcome, JobSummary, UnitOfWork};
