// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod task;

// Re-exports
pub use error::DomainError;
pub use job::{Job, JobId, JobName, JobPayload, JobState};
pub use task::{
    NewTask, Task, TaskFilter, TaskId, TaskPage, TaskPatch, TaskPriority, TaskStatus, UserId,
};
