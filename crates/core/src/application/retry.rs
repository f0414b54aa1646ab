// Retry policy for failed job attempts

use crate::domain::{Job, JobState};
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the job (with backoff delay in ms)
    Retry(u64),
    /// Attempt budget exhausted, job fails permanently
    Exhausted,
}

/// Exponential backoff retry policy.
///
/// A job that has consumed its whole attempt budget is terminal-failed;
/// otherwise the next attempt runs after
/// `backoff_base_delay_ms * 2^(attempts_made - 1)`.
#[derive(Debug, Default)]
pub struct RetryPolicy;

impl RetryPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Determine if a job should be retried after a failed attempt.
    ///
    /// `attempts_made` counts the attempt that just failed; the first
    /// failure retries after the base delay, the second after twice that,
    /// and so on.
    pub fn should_retry(&self, job: &Job) -> RetryDecision {
        if !job.has_attempts_left() {
            warn!(
                job_id = %job.id,
                attempts = job.attempts_made,
                max_attempts = job.max_attempts,
                "Max retry attempts reached"
            );
            return RetryDecision::Exhausted;
        }

        let exponent = job.attempts_made.saturating_sub(1);
        let delay_ms = job
            .backoff_base_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent));

        info!(
            job_id = %job.id,
            attempt = job.attempts_made,
            max_attempts = job.max_attempts,
            delay_ms,
            "Scheduling retry"
        );

        RetryDecision::Retry(delay_ms)
    }

    /// Reset a running job back to Queued ahead of its next attempt.
    /// The attempt counter is consumed at dequeue time, not here.
    pub fn prepare_for_retry(&self, job: &mut Job) {
        job.state = JobState::Queued;
        job.started_at = None;
    }
}
