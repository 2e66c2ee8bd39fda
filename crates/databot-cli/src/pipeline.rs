//! Stand-in for the automation pipeline the scheduler drives.
//!
//! The real fetch → clean → transform → store → report stages live outside
//! the scheduling core and are opaque to it; this module gives the host
//! binary a unit of work to register so the end-to-end wiring can be run.

use std::sync::Arc;
use std::time::Duration;

use databot_scheduler::{JobOutcome, UnitOfWork};
use futures::FutureExt;

pub fn unit_of_work() -> UnitOfWork {
    Arc::new(|| process_data().boxed())
}

async fn process_data() -> JobOutcome {
    tracing::info!("starting data processing run");

    for stage in ["fetch", "clean", "transform", "store", "report"] {
        tracing::info!(stage, "stage started");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    tracing::info!("data processing run complete");
    JobOutcome::Success
}
