//! Taskpipe Daemon - Main Entry Point
//!
//! Composition root: wires the queue, worker pool, sweep trigger and the
//! in-process adapters, then runs until ctrl-c. The producer API
//! (TaskService) is consumed in-process by the surrounding service.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use taskpipe_core::application::constants::{DEFAULT_SWEEP_INTERVAL, DEFAULT_WORKER_COUNT};
use taskpipe_core::application::{shutdown_channel, JobQueue, SweepTrigger, WorkerPool};
use taskpipe_core::port::id_provider::UuidProvider;
use taskpipe_core::port::time_provider::SystemTimeProvider;
use taskpipe_core::port::{Notifier, TaskStore};
use taskpipe_infra_memory::{InMemoryTaskStore, TracingNotifier};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging (JSON for production, pretty for development)
    let log_format = std::env::var("TASKPIPE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("taskpipe=info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Taskpipe v{} starting...", VERSION);

    // 2. Load configuration
    let workers: usize = std::env::var("TASKPIPE_WORKERS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_WORKER_COUNT);
    let sweep_interval_secs: u64 = std::env::var("TASKPIPE_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SWEEP_INTERVAL.as_secs());

    // 3. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new(time_provider.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier::new());

    let queue = JobQueue::new(id_provider, time_provider.clone());

    // 4. Start worker pool
    info!(workers, "Starting workers...");
    let pool = WorkerPool::new(
        queue.clone(),
        store,
        notifier,
        time_provider.clone(),
        workers,
    );
    let pool_handle = pool.start();

    // 5. Start sweep trigger on its own timer task
    info!(sweep_interval_secs, "Starting sweep trigger...");
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let trigger = SweepTrigger::new(
        queue.clone(),
        Duration::from_secs(sweep_interval_secs),
        time_provider,
    );
    let trigger_handle = tokio::spawn(async move { trigger.run(shutdown_rx).await });

    info!("System ready. Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown: stop the trigger, close the queue, drain workers
    shutdown_tx.shutdown();
    queue.close();
    let _ = tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, pool_handle.join()).await;
    let _ = trigger_handle.await;

    info!("Shutdown complete.");
    Ok(())
}
