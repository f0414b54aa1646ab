// Sweep Trigger - periodic producer of overdue-sweep jobs
//
// The timer loop only ever enqueues; it never runs a handler, so slow sweep
// work can never delay the next tick. A failed enqueue is logged and the
// next scheduled tick serves as the retry, which is also why the job itself
// carries attempts = 1.

use crate::application::queue::{EnqueueOptions, JobQueue};
use crate::application::worker::ShutdownToken;
use crate::domain::JobName;
use crate::port::TimeProvider;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

pub struct SweepTrigger {
    queue: JobQueue,
    interval: Duration,
    time_provider: Arc<dyn TimeProvider>,
}

impl SweepTrigger {
    pub fn new(queue: JobQueue, interval: Duration, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            queue,
            interval,
            time_provider,
        }
    }

    /// Run the timer loop until shutdown. One enqueue per tick, nothing else.
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval fires immediately; consume that tick so the first sweep
        // lands one full interval after startup.
        ticker.tick().await;

        info!(
            interval_secs = self.interval.as_secs(),
            "Sweep trigger started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => self.fire(),
                _ = shutdown.wait() => {
                    info!("Sweep trigger shutting down");
                    break;
                }
            }
        }
    }

    fn fire(&self) {
        let triggered_at = self.time_provider.now_millis();
        let options = EnqueueOptions {
            attempts: 1, // the next tick is the retry
            ..Default::default()
        };
        match self.queue.enqueue(
            JobName::OverdueSweep,
            json!({ "triggeredAt": triggered_at }),
            options,
        ) {
            Ok(handle) => {
                info!(job_id = %handle.id, triggered_at, "Overdue sweep enqueued");
            }
            Err(e) => {
                error!(error = %e, "Failed to enqueue overdue sweep, next tick will try again");
            }
        }
    }
}
