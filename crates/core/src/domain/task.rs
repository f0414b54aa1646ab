// Task Domain Model
//
// Task is an external entity, referenced not owned: the pipeline reads and
// writes it through the TaskStore port only and never caches it across job
// executions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Task ID (opaque string, assigned by the store)
pub type TaskId = String;

/// User ID of the task assignee
pub type UserId = String;

/// Task status, a closed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = crate::domain::error::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(crate::domain::error::DomainError::UnknownStatus(
                other.to_string(),
            )),
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Task entity as seen through the TaskStore port.
///
/// `user_email` is the assignee's email, resolved by the store adapter at
/// read time (join against the users table); None when the task has no
/// assignee or the assignee has no email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<i64>, // epoch ms
    pub user_id: Option<UserId>,
    pub user_email: Option<String>,
    pub created_at: i64, // epoch ms
}

/// Attributes for task creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    pub due_date: Option<i64>,
    pub user_id: Option<UserId>,
    pub user_email: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            due_date: None,
            user_id: None,
            user_email: None,
        }
    }
}

/// Partial update applied to a task. None fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<i64>,
}

/// Filter for paginated task reads
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Tasks whose due date is strictly before this instant (epoch ms).
    /// Tasks without a due date never match when this is set.
    pub due_before: Option<i64>,
    pub status: Option<TaskStatus>,
    pub user_id: Option<UserId>,
}

impl TaskFilter {
    /// Predicate shared by store adapters.
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(before) = self.due_before {
            match task.due_date {
                Some(due) if due < before => {}
                _ => return false,
            }
        }
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(user_id) = &self.user_id {
            if task.user_id.as_ref() != Some(user_id) {
                return false;
            }
        }
        true
    }
}

/// One page of a filtered task read
#[derive(Debug, Clone)]
pub struct TaskPage {
    pub items: Vec<Task>,
    /// Total number of tasks matching the filter, across all pages.
    pub total: u64,
}
