// Job Queue - owned, internally synchronized broker
//
// A lock-protected deque with Notify-based wakeups. The queue is the only
// shared mutable structure in the pipeline; every mutation (enqueue, dequeue,
// attempt increment, retry scheduling) happens under its lock.

use crate::application::constants::{DEFAULT_BACKOFF_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS};
use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::{Job, JobId, JobName, JobPayload};
use crate::error::{PipelineError, Result};
use crate::port::{IdProvider, TimeProvider};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info};

/// Per-enqueue retry options
#[derive(Debug, Clone, Copy)]
pub struct EnqueueOptions {
    /// Attempt budget; 1 means no retry.
    pub attempts: u32,
    /// Exponential backoff base delay.
    pub backoff_base_delay_ms: u64,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_delay_ms: DEFAULT_BACKOFF_BASE_DELAY_MS,
        }
    }
}

/// Handle returned to producers on enqueue
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub id: JobId,
    pub name: JobName,
}

/// Queue counters exposed for tests and operators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub acked: u64,
    pub retries_scheduled: u64,
    pub terminal_failed: u64,
}

#[derive(Default)]
struct QueueInner {
    ready: VecDeque<Job>,
    /// Terminal-failed jobs, retained for operator inspection until purged.
    failed: Vec<Job>,
    /// Retries sleeping on a timer, not yet back in `ready`.
    pending_retries: usize,
    closed: bool,
    stats: QueueStats,
}

struct QueueCore {
    inner: Mutex<QueueInner>,
    notify: Notify,
    retry_policy: RetryPolicy,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

/// Cheaply cloneable handle to the shared broker.
#[derive(Clone)]
pub struct JobQueue {
    core: Arc<QueueCore>,
}

impl JobQueue {
    pub fn new(id_provider: Arc<dyn IdProvider>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            core: Arc::new(QueueCore {
                inner: Mutex::new(QueueInner::default()),
                notify: Notify::new(),
                retry_policy: RetryPolicy::new(),
                id_provider,
                time_provider,
            }),
        }
    }

    /// Enqueue a job. Synchronous and non-blocking so it is safe from the
    /// trigger's timer loop; fails only when the queue is closed.
    pub fn enqueue(
        &self,
        name: JobName,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<JobHandle> {
        let job = Job::new(
            self.core.id_provider.generate_id(),
            self.core.time_provider.now_millis(),
            name,
            JobPayload::new(payload),
            options.attempts,
            options.backoff_base_delay_ms,
        );
        let handle = JobHandle {
            id: job.id.clone(),
            name,
        };

        {
            let mut inner = self.core.lock();
            if inner.closed {
                return Err(PipelineError::QueueClosed);
            }
            inner.ready.push_back(job);
            inner.stats.enqueued += 1;
        }
        self.core.notify.notify_one();

        debug!(job_id = %handle.id, job_name = %name, "Job enqueued");
        Ok(handle)
    }

    /// Await the next job. Returns None once the queue is closed and fully
    /// drained, including retries still sleeping on their backoff timers.
    ///
    /// The returned job has consumed one attempt and is in Running state.
    pub async fn dequeue(&self) -> Option<Job> {
        loop {
            let notified = self.core.notify.notified();
            {
                let mut inner = self.core.lock();
                while let Some(mut job) = inner.ready.pop_front() {
                    let now = self.core.time_provider.now_millis();
                    if let Err(e) = job.begin_attempt(now) {
                        // Only reachable if a job re-entered the deque in a
                        // bad state; drop it rather than wedge the slot.
                        error!(job_id = %job.id, error = %e, "Dropping job in unexpected state");
                        continue;
                    }
                    if !inner.ready.is_empty() {
                        self.core.notify.notify_one();
                    }
                    return Some(job);
                }
                if inner.closed && inner.pending_retries == 0 {
                    drop(inner);
                    self.core.notify.notify_waiters();
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Terminal success (or an unrecoverable drop decided by the worker).
    /// The job is consumed; only the counter survives.
    pub fn ack(&self, mut job: Job) {
        let now = self.core.time_provider.now_millis();
        if let Err(e) = job.complete(now) {
            debug!(job_id = %job.id, error = %e, "Acked job was not running");
        }
        let mut inner = self.core.lock();
        inner.stats.acked += 1;
        self.core.wake_if_drained(&inner);
    }

    /// Failed attempt. Either schedules a delayed retry or, once the attempt
    /// budget is spent, retains the job as terminal-failed.
    pub fn nack(&self, mut job: Job, error: &PipelineError) {
        match self.core.retry_policy.should_retry(&job) {
            RetryDecision::Retry(delay_ms) => {
                self.core.retry_policy.prepare_for_retry(&mut job);
                job.last_error = Some(error.to_string());
                {
                    let mut inner = self.core.lock();
                    inner.pending_retries += 1;
                    inner.stats.retries_scheduled += 1;
                }
                let core = Arc::clone(&self.core);
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    core.requeue(job);
                });
            }
            RetryDecision::Exhausted => {
                let now = self.core.time_provider.now_millis();
                error!(
                    job_id = %job.id,
                    job_name = %job.name,
                    attempts = job.attempts_made,
                    error = %error,
                    "Job terminal-failed, retained for inspection"
                );
                job.fail(now, error.to_string());
                let mut inner = self.core.lock();
                inner.stats.terminal_failed += 1;
                inner.failed.push(job);
                self.core.wake_if_drained(&inner);
            }
        }
    }

    /// Stop accepting new jobs and let consumers drain what remains.
    pub fn close(&self) {
        {
            let mut inner = self.core.lock();
            inner.closed = true;
        }
        self.core.notify.notify_waiters();
        info!("Job queue closed");
    }

    pub fn stats(&self) -> QueueStats {
        self.core.lock().stats
    }

    /// Terminal-failed jobs (id, name, payload, attempts, last error),
    /// kept until purged.
    pub fn failed_jobs(&self) -> Vec<Job> {
        self.core.lock().failed.clone()
    }

    /// Discard retained terminal-failed jobs after inspection.
    pub fn purge_failed(&self) -> usize {
        let mut inner = self.core.lock();
        let purged = inner.failed.len();
        inner.failed.clear();
        purged
    }

    /// Jobs currently waiting in the deque (retries on timers excluded).
    pub fn depth(&self) -> usize {
        self.core.lock().ready.len()
    }
}

impl QueueCore {
    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A backoff timer fired: return the job to the deque.
    /// Runs even after close so in-flight retries are never lost.
    fn requeue(&self, job: Job) {
        {
            let mut inner = self.lock();
            inner.pending_retries -= 1;
            inner.ready.push_back(job);
        }
        self.notify.notify_one();
    }

    /// After close, waiting consumers must observe the drained queue.
    fn wake_if_drained(&self, inner: &QueueInner) {
        if inner.closed && inner.ready.is_empty() && inner.pending_retries == 0 {
            self.notify.notify_waiters();
        }
    }
}
