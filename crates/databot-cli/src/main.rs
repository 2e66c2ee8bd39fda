mod pipeline;

use std::time::Duration;

use clap::{Parser, Subcommand};
use databot_scheduler::{Scheduler, SchedulerConfig, Trigger};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "databot-cli")]
#[command(about = "databot automation host command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the automation host until interrupted.
    Run {
        /// Override DATABOT_JOB_INTERVAL_SECS for the data-processing job.
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Execute the data-processing job a single time and print its record.
    Once,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = databot_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Once) => run_once(&config).await,
        Some(Commands::Run { interval_secs }) => run_host(&config, interval_secs).await,
        None => run_host(&config, None).await,
    }
}

fn build_scheduler(config: &databot_core::AppConfig) -> Scheduler {
    Scheduler::new(SchedulerConfig {
        workers: config.worker_count,
        default_max_history: config.default_max_history,
        tick_interval: Duration::from_millis(config.tick_interval_ms),
        shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
    })
}

/// Register the recurring data-processing job and run until a shutdown
/// signal arrives.
async fn run_host(
    config: &databot_core::AppConfig,
    interval_secs: Option<u64>,
) -> anyhow::Result<()> {
    let scheduler = build_scheduler(config);
    let every = interval_secs.unwrap_or(config.job_interval_secs);
    scheduler.add_job(
        "data-processing",
        "Recurring data processing run",
        pipeline::unit_of_work(),
        Trigger::interval_secs(every),
        None,
    )?;

    scheduler.start();
    tracing::info!(
        env = %config.env,
        every_secs = every,
        "databot host running; press ctrl-c to stop"
    );

    shutdown_signal().await;
    tracing::info!("received shutdown signal, starting graceful shutdown");
    scheduler.stop().await;

    let history = scheduler.get_history("data-processing");
    tracing::info!(runs = history.len(), "host stopped");
    Ok(())
}

/// Fire the data-processing job once, wait for it to finish, and print the
/// execution record as JSON.
async fn run_once(config: &databot_core::AppConfig) -> anyhow::Result<()> {
    let scheduler = build_scheduler(config);
    scheduler.add_job(
        "data-processing",
        "One-off data processing run",
        pipeline::unit_of_work(),
        Trigger::Immediate,
        Some(1),
    )?;
    scheduler.start();

    // An Immediate trigger fires on the first tick; poll for the terminal record.
    let record = loop {
        let last = scheduler.get_history("data-processing").pop();
        if let Some(record) = last {
            if record.status.is_terminal() {
                break record;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };
    scheduler.stop().await;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
