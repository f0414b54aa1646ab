// Job Domain Model

use serde::{Deserialize, Serialize};

/// Job ID (UUID v4 in production, injected via IdProvider)
pub type JobId = String;

/// Job type, a closed set. Dispatch in the worker is an exhaustive match,
/// so adding a variant forces every dispatch site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobName {
    StatusUpdate,
    OverdueSweep,
}

impl std::fmt::Display for JobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobName::StatusUpdate => write!(f, "status-update"),
            JobName::OverdueSweep => write!(f, "overdue-sweep"),
        }
    }
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Failed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "QUEUED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Done => write!(f, "DONE"),
            JobState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Job Payload (JSON serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Job Entity
///
/// Created by the producer or the sweep trigger, mutated only by the queue
/// and worker (attempt increment, state transitions). Dropped on terminal
/// success, retained by the queue on terminal failure for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: JobName,
    pub payload: JobPayload,

    pub state: JobState,

    /// Attempts started so far. Invariant: `attempts_made <= max_attempts`.
    pub attempts_made: u32,
    pub max_attempts: u32,
    /// Base delay for exponential backoff: `base * 2^(attempts_made - 1)`.
    pub backoff_base_delay_ms: u64,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,

    /// Error message of the most recent failed attempt.
    pub last_error: Option<String>,
}

impl Job {
    /// Create a new queued job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `name` - Job type
    /// * `payload` - Job payload
    /// * `max_attempts` - Attempt budget (terminal failure once exhausted)
    /// * `backoff_base_delay_ms` - Exponential backoff base delay
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        name: JobName,
        payload: JobPayload,
        max_attempts: u32,
        backoff_base_delay_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name,
            payload,
            state: JobState::Queued,
            attempts_made: 0,
            max_attempts: max_attempts.max(1),
            backoff_base_delay_ms,
            created_at,
            started_at: None,
            finished_at: None,
            last_error: None,
        }
    }

    /// Transition Queued -> Running and consume one attempt from the budget.
    pub fn begin_attempt(&mut self, now_millis: i64) -> crate::domain::error::Result<()> {
        if self.state != JobState::Queued {
            return Err(self.invalid_transition("RUNNING"));
        }
        if self.attempts_made >= self.max_attempts {
            return Err(crate::domain::error::DomainError::AttemptBudgetExhausted {
                job_id: self.id.clone(),
                attempts_made: self.attempts_made,
                max_attempts: self.max_attempts,
            });
        }
        self.attempts_made += 1;
        self.state = JobState::Running;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Transition Running -> Done (terminal success)
    pub fn complete(&mut self, now_millis: i64) -> crate::domain::error::Result<()> {
        if self.state != JobState::Running {
            return Err(self.invalid_transition("DONE"));
        }
        self.state = JobState::Done;
        self.finished_at = Some(now_millis);
        Ok(())
    }

    /// Mark terminal-failed with the error of the final attempt.
    pub fn fail(&mut self, now_millis: i64, error: impl Into<String>) {
        self.state = JobState::Failed;
        self.finished_at = Some(now_millis);
        self.last_error = Some(error.into());
    }

    /// Whether the attempt budget still allows another execution.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts_made < self.max_attempts
    }

    fn invalid_transition(&self, to: &str) -> crate::domain::error::DomainError {
        crate::domain::error::DomainError::InvalidStateTransition {
            from: self.state.to_string(),
            to: to.to_string(),
        }
    }
}

impl Job {
    /// Create a test job with deterministic ID and timestamp.
    ///
    /// Uses a simple counter for deterministic test IDs (test-1, test-2, ...).
    /// Timestamps start at 1000 and increment by 1000.
    ///
    /// **Note**: This method should only be used in tests. For production code,
    /// always inject ID and time via providers.
    pub fn new_test(name: JobName, payload: JobPayload) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let id = format!("test-{}", counter);
        let created_at = (counter * 1000) as i64;

        Self::new(id, created_at, name, payload, 3, 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn begin_attempt_consumes_budget_and_runs() {
        let mut job = Job::new_test(JobName::StatusUpdate, JobPayload::new(json!({})));
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.attempts_made, 0);

        job.begin_attempt(42).unwrap();
        assert_eq!(job.state, JobState::Running);
        assert_eq!(job.attempts_made, 1);
        assert_eq!(job.started_at, Some(42));
    }

    #[test]
    fn begin_attempt_rejects_non_queued_state() {
        let mut job = Job::new_test(JobName::StatusUpdate, JobPayload::new(json!({})));
        job.begin_attempt(1).unwrap();

        let err = job.begin_attempt(2).unwrap_err();
        assert!(matches!(
            err,
            crate::domain::DomainError::InvalidStateTransition { .. }
        ));
    }

    #[test]
    fn begin_attempt_rejects_exhausted_budget() {
        let mut job = Job::new_test(JobName::OverdueSweep, JobPayload::new(json!({})));
        job.max_attempts = 1;
        job.attempts_made = 1;
        job.state = JobState::Queued;

        let err = job.begin_attempt(1).unwrap_err();
        assert!(matches!(
            err,
            crate::domain::DomainError::AttemptBudgetExhausted { .. }
        ));
    }

    #[test]
    fn complete_requires_running() {
        let mut job = Job::new_test(JobName::StatusUpdate, JobPayload::new(json!({})));
        assert!(job.complete(1).is_err());

        job.begin_attempt(1).unwrap();
        job.complete(2).unwrap();
        assert_eq!(job.state, JobState::Done);
        assert_eq!(job.finished_at, Some(2));
    }

    #[test]
    fn fail_records_last_error() {
        let mut job = Job::new_test(JobName::StatusUpdate, JobPayload::new(json!({})));
        job.begin_attempt(1).unwrap();
        job.fail(2, "store unavailable");

        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.last_error.as_deref(), Some("store unavailable"));
    }

    #[test]
    fn job_name_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(JobName::StatusUpdate).unwrap(),
            json!("status-update")
        );
        assert_eq!(
            serde_json::to_value(JobName::OverdueSweep).unwrap(),
            json!("overdue-sweep")
        );
        assert_eq!(JobName::StatusUpdate.to_string(), "status-update");
    }
}
