// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Job {job_id} attempt budget exhausted: {attempts_made}/{max_attempts}")]
    AttemptBudgetExhausted {
        job_id: String,
        attempts_made: u32,
        max_attempts: u32,
    },

    #[error("Unknown task status: {0}")]
    UnknownStatus(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
