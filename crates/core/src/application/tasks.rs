// Task mutation use cases (the producer side of the pipeline)
//
// Every mutation persists through one store transaction and enqueues its
// follow-up job while that transaction is open, so a queue failure rolls the
// write back. The one gap left is a commit failure after the enqueue: the
// orphaned job then retries against a missing row and terminal-fails, which
// is the documented at-least-once fallback.

use crate::application::queue::{EnqueueOptions, JobQueue};
use crate::domain::{JobName, NewTask, Task, TaskId, TaskPatch, TaskStatus};
use crate::error::{PipelineError, Result};
use crate::port::TaskStore;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

pub struct TaskService {
    store: Arc<dyn TaskStore>,
    queue: JobQueue,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, queue: JobQueue) -> Self {
        Self { store, queue }
    }

    /// Create a task and enqueue one status-update job carrying its initial
    /// status, atomically with the insert.
    pub async fn create_task(&self, attrs: NewTask) -> Result<Task> {
        let mut tx = self.store.begin().await?;
        let task = tx.create_task(attrs).await?;

        if let Err(e) = self.enqueue_status_update(&task.id, task.status) {
            rollback_on_enqueue_failure(tx, &e).await;
            return Err(e);
        }

        tx.commit().await?;
        info!(
            task_id = %task.id,
            status = %task.status,
            "Task created, status-update job enqueued"
        );
        Ok(task)
    }

    /// Apply a patch. A status-update job is enqueued only when the status
    /// value actually changed against the pre-update snapshot.
    pub async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<Task> {
        let mut tx = self.store.begin().await?;
        let before = tx
            .find_by_id(id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("task {}", id)))?;
        let task = tx.update_task(id, patch).await?;

        if task.status != before.status {
            if let Err(e) = self.enqueue_status_update(&task.id, task.status) {
                rollback_on_enqueue_failure(tx, &e).await;
                return Err(e);
            }
        }

        tx.commit().await?;
        info!(
            task_id = %task.id,
            status = %task.status,
            status_changed = task.status != before.status,
            "Task updated"
        );
        Ok(task)
    }

    /// Persist one bulk status write, then enqueue one job per affected id.
    /// Each job carries its own retry budget so one id's failure never
    /// blocks the others.
    pub async fn update_status_bulk(
        &self,
        ids: &[TaskId],
        status: TaskStatus,
    ) -> Result<Vec<TaskId>> {
        let mut tx = self.store.begin().await?;
        let affected = tx.set_status_bulk(ids, status).await?;

        for id in &affected {
            if let Err(e) = self.enqueue_status_update(id, status) {
                rollback_on_enqueue_failure(tx, &e).await;
                return Err(e);
            }
        }

        tx.commit().await?;
        info!(
            affected = affected.len(),
            status = %status,
            "Bulk status update persisted, one job per task enqueued"
        );
        Ok(affected)
    }

    fn enqueue_status_update(&self, task_id: &TaskId, status: TaskStatus) -> Result<()> {
        self.queue
            .enqueue(
                JobName::StatusUpdate,
                json!({ "taskId": task_id, "status": status }),
                EnqueueOptions::default(),
            )
            .map(|_| ())
    }
}

async fn rollback_on_enqueue_failure(
    tx: Box<dyn crate::port::TaskStoreTransaction>,
    cause: &PipelineError,
) {
    error!(error = %cause, "Enqueue failed, rolling back task write");
    if let Err(rb) = tx.rollback().await {
        error!(error = %rb, "Rollback after enqueue failure also failed");
    }
}
