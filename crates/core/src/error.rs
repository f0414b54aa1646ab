// Central Error Types for the Pipeline

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Mail transport error: {0}")]
    Mail(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Queue is closed")]
    QueueClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure classification at the job-handler boundary.
///
/// The worker maps this onto queue operations: `Unrecoverable` is acked and
/// dropped (never retried), `Recoverable` is nacked and goes through the
/// queue's backoff/retry machinery.
#[derive(Error, Debug)]
pub enum JobError {
    /// Malformed payload or referential violation. Never retried.
    #[error("Unrecoverable job failure: {0}")]
    Unrecoverable(String),

    /// Transient dependency failure. Retried up to the job's attempt budget.
    #[error("Recoverable job failure: {0}")]
    Recoverable(#[from] PipelineError),
}

impl JobError {
    pub fn unrecoverable(reason: impl Into<String>) -> Self {
        JobError::Unrecoverable(reason.into())
    }
}
