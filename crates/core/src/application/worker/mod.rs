// Worker Pool - bounded concurrent job execution

mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::constants::DEFAULT_WORKER_COUNT;
use crate::application::queue::JobQueue;
use crate::application::status_update::StatusUpdateHandler;
use crate::application::sweep::OverdueSweepHandler;
use crate::domain::{Job, JobName};
use crate::error::JobError;
use crate::port::{Notifier, TaskStore, TimeProvider};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// One execution slot: dequeue, dispatch by job name, feed the outcome back
/// into the queue's retry machinery.
pub struct Worker {
    slot: usize,
    queue: JobQueue,
    status_update: StatusUpdateHandler,
    sweep: OverdueSweepHandler,
}

impl Worker {
    pub fn new(
        slot: usize,
        queue: JobQueue,
        status_update: StatusUpdateHandler,
        sweep: OverdueSweepHandler,
    ) -> Self {
        Self {
            slot,
            queue,
            status_update,
            sweep,
        }
    }

    /// Loop until the queue reports itself closed and drained.
    pub async fn run(&self) {
        info!(slot = self.slot, "Worker started");
        while let Some(job) = self.queue.dequeue().await {
            self.process(job).await;
        }
        info!(slot = self.slot, "Worker stopped");
    }

    async fn process(&self, job: Job) {
        info!(
            job_id = %job.id,
            job_name = %job.name,
            attempt = job.attempts_made,
            "Processing job"
        );

        // Closed dispatch: a new JobName variant will not compile until it
        // is handled here.
        let outcome = match job.name {
            JobName::StatusUpdate => self.status_update.handle(&job).await,
            JobName::OverdueSweep => self.sweep.handle(&job).await,
        };

        match outcome {
            Ok(()) => {
                info!(job_id = %job.id, job_name = %job.name, "Job completed");
                self.queue.ack(job);
            }
            Err(JobError::Unrecoverable(reason)) => {
                error!(
                    job_id = %job.id,
                    job_name = %job.name,
                    payload = %job.payload.as_value(),
                    %reason,
                    "Unrecoverable job failure, dropping without retry"
                );
                self.queue.ack(job);
            }
            Err(JobError::Recoverable(source)) => {
                error!(
                    job_id = %job.id,
                    job_name = %job.name,
                    attempt = job.attempts_made,
                    max_attempts = job.max_attempts,
                    error = %source,
                    "Job attempt failed"
                );
                self.queue.nack(job, &source);
            }
        }
    }
}

/// Fixed-size pool of workers sharing one queue. A slow handler occupies one
/// slot; the others keep draining.
pub struct WorkerPool {
    queue: JobQueue,
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
    time_provider: Arc<dyn TimeProvider>,
    size: usize,
}

impl WorkerPool {
    pub fn new(
        queue: JobQueue,
        store: Arc<dyn TaskStore>,
        notifier: Arc<dyn Notifier>,
        time_provider: Arc<dyn TimeProvider>,
        size: usize,
    ) -> Self {
        Self {
            queue,
            store,
            notifier,
            time_provider,
            size: size.max(1),
        }
    }

    pub fn with_default_size(
        queue: JobQueue,
        store: Arc<dyn TaskStore>,
        notifier: Arc<dyn Notifier>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self::new(queue, store, notifier, time_provider, DEFAULT_WORKER_COUNT)
    }

    /// Spawn every worker slot onto the runtime. Workers exit on their own
    /// once the queue is closed and drained; join via the returned handle.
    pub fn start(&self) -> WorkerPoolHandle {
        info!(workers = self.size, "Starting worker pool");

        let handles = (0..self.size)
            .map(|slot| {
                let worker = Worker::new(
                    slot,
                    self.queue.clone(),
                    StatusUpdateHandler::new(Arc::clone(&self.store)),
                    OverdueSweepHandler::new(
                        Arc::clone(&self.store),
                        Arc::clone(&self.notifier),
                        Arc::clone(&self.time_provider),
                    ),
                );
                tokio::spawn(async move { worker.run().await })
            })
            .collect();

        WorkerPoolHandle { handles }
    }
}

/// Join handle over all worker slots
pub struct WorkerPoolHandle {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPoolHandle {
    /// Await every worker slot. Panicking slots are logged, not propagated;
    /// one poisoned handler must not take the daemon down with it.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = ?e, "Worker task aborted");
            }
        }
        info!("Worker pool drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::queue::EnqueueOptions;
    use crate::domain::{Task, TaskPriority, TaskStatus};
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::notifier::mocks::MockNotifier;
    use crate::port::task_store::mocks::MockTaskStore;
    use crate::port::time_provider::mocks::MockTimeProvider;
    use serde_json::json;

    fn pipeline() -> (Arc<MockTaskStore>, Arc<MockNotifier>, JobQueue, WorkerPool) {
        let store = Arc::new(MockTaskStore::new());
        let notifier = Arc::new(MockNotifier::new());
        let time_provider = Arc::new(MockTimeProvider::new(1_000_000));
        let queue = JobQueue::new(Arc::new(SequentialIdProvider::new()), time_provider.clone());
        let pool = WorkerPool::new(
            queue.clone(),
            store.clone(),
            notifier.clone(),
            time_provider,
            2,
        );
        (store, notifier, queue, pool)
    }

    fn pending_task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            title: "t".to_string(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            due_date: None,
            user_id: None,
            user_email: None,
            created_at: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn successful_job_is_acked() {
        let (store, _notifier, queue, pool) = pipeline();
        store.seed(pending_task("t1"));

        queue
            .enqueue(
                JobName::StatusUpdate,
                json!({"taskId": "t1", "status": "completed"}),
                EnqueueOptions::default(),
            )
            .unwrap();
        queue.close();
        pool.start().join().await;

        assert_eq!(store.task("t1").unwrap().status, TaskStatus::Completed);
        let stats = queue.stats();
        assert_eq!(stats.acked, 1);
        assert_eq!(stats.retries_scheduled, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unrecoverable_job_is_dropped_without_retry() {
        let (store, _notifier, queue, pool) = pipeline();
        store.seed(pending_task("t1"));

        queue
            .enqueue(
                JobName::StatusUpdate,
                json!({"taskId": "t1", "status": "not-a-status"}),
                EnqueueOptions::default(),
            )
            .unwrap();
        queue.close();
        pool.start().join().await;

        assert_eq!(store.set_status_calls(), 0, "store never touched");
        let stats = queue.stats();
        assert_eq!(stats.acked, 1);
        assert_eq!(stats.retries_scheduled, 0);
        assert!(queue.failed_jobs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn recoverable_job_retries_until_terminal_failure() {
        let (store, _notifier, queue, pool) = pipeline();
        // Well-formed id, but the task never exists: NotFound every attempt.
        queue
            .enqueue(
                JobName::StatusUpdate,
                json!({"taskId": "ghost", "status": "completed"}),
                EnqueueOptions {
                    attempts: 3,
                    backoff_base_delay_ms: 10,
                },
            )
            .unwrap();
        queue.close();
        pool.start().join().await;

        assert_eq!(store.set_status_calls(), 3, "one per attempt");
        let failed = queue.failed_jobs();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].attempts_made, 3);
        assert_eq!(queue.stats().retries_scheduled, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_then_success() {
        let (store, _notifier, queue, pool) = pipeline();
        store.seed(pending_task("t1"));
        store.fail_next_set_status(2);

        queue
            .enqueue(
                JobName::StatusUpdate,
                json!({"taskId": "t1", "status": "completed"}),
                EnqueueOptions {
                    attempts: 3,
                    backoff_base_delay_ms: 10,
                },
            )
            .unwrap();
        queue.close();
        pool.start().join().await;

        assert_eq!(store.set_status_calls(), 3);
        assert_eq!(store.task("t1").unwrap().status, TaskStatus::Completed);
        let stats = queue.stats();
        assert_eq!(stats.acked, 1);
        assert_eq!(stats.retries_scheduled, 2);
        assert_eq!(stats.terminal_failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_job_dispatches_to_the_sweep_handler() {
        let (store, notifier, queue, pool) = pipeline();
        store.seed(Task {
            due_date: Some(999_999),
            user_email: Some("a@example.com".to_string()),
            ..pending_task("t1")
        });

        queue
            .enqueue(
                JobName::OverdueSweep,
                json!({"triggeredAt": 1_000_000}),
                EnqueueOptions {
                    attempts: 1,
                    backoff_base_delay_ms: 10,
                },
            )
            .unwrap();
        queue.close();
        pool.start().join().await;

        assert_eq!(notifier.sent_count(), 1);
        assert_eq!(queue.stats().acked, 1);
    }
}
