// Status Update Handler
//
// Confirms a task's status in the store after the originating mutation.
// Idempotent: re-running it writes the same value again.

use crate::domain::{Job, TaskStatus};
use crate::error::JobError;
use crate::port::TaskStore;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusUpdatePayload {
    task_id: String,
    status: String,
}

#[derive(Clone)]
pub struct StatusUpdateHandler {
    store: Arc<dyn TaskStore>,
}

impl StatusUpdateHandler {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Classification:
    /// - missing payload fields, unknown status value, blank task id:
    ///   Unrecoverable (the payload will never become valid)
    /// - task not found under a well-formed id: Recoverable, since a
    ///   read-after-write race with the producer's commit is possible
    /// - any other store error: Recoverable
    pub async fn handle(&self, job: &Job) -> Result<(), JobError> {
        let payload: StatusUpdatePayload =
            serde_json::from_value(job.payload.as_value().clone()).map_err(|e| {
                JobError::unrecoverable(format!("malformed status-update payload: {}", e))
            })?;

        if payload.task_id.trim().is_empty() {
            return Err(JobError::unrecoverable(
                "status-update payload has an empty taskId",
            ));
        }

        let status: TaskStatus = payload
            .status
            .parse()
            .map_err(|e: crate::domain::DomainError| JobError::unrecoverable(e.to_string()))?;

        let task = self
            .store
            .set_status(&payload.task_id, status)
            .await
            .map_err(JobError::Recoverable)?;

        info!(task_id = %task.id, status = %status, "Task status persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobName, JobPayload, Task, TaskPriority};
    use crate::error::PipelineError;
    use crate::port::task_store::mocks::MockTaskStore;
    use serde_json::json;

    fn seeded_store() -> Arc<MockTaskStore> {
        let store = Arc::new(MockTaskStore::new());
        store.seed(Task {
            id: "t1".to_string(),
            title: "ship release".to_string(),
            status: TaskStatus::Pending,
            priority: TaskPriority::High,
            due_date: None,
            user_id: None,
            user_email: None,
            created_at: 0,
        });
        store
    }

    fn status_job(payload: serde_json::Value) -> Job {
        Job::new_test(JobName::StatusUpdate, JobPayload::new(payload))
    }

    #[tokio::test]
    async fn writes_status_for_valid_payload() {
        let store = seeded_store();
        let handler = StatusUpdateHandler::new(store.clone());

        let job = status_job(json!({"taskId": "t1", "status": "completed"}));
        handler.handle(&job).await.unwrap();

        assert_eq!(store.task("t1").unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn missing_field_is_unrecoverable_and_skips_store() {
        let store = seeded_store();
        let handler = StatusUpdateHandler::new(store.clone());

        let job = status_job(json!({"taskId": "t1"}));
        let err = handler.handle(&job).await.unwrap_err();

        assert!(matches!(err, JobError::Unrecoverable(_)));
        assert_eq!(store.set_status_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_status_is_unrecoverable() {
        let store = seeded_store();
        let handler = StatusUpdateHandler::new(store.clone());

        let job = status_job(json!({"taskId": "t1", "status": "archived"}));
        let err = handler.handle(&job).await.unwrap_err();

        assert!(matches!(err, JobError::Unrecoverable(_)));
        assert_eq!(store.set_status_calls(), 0);
    }

    #[tokio::test]
    async fn blank_task_id_is_unrecoverable() {
        let handler = StatusUpdateHandler::new(seeded_store());

        let job = status_job(json!({"taskId": "  ", "status": "pending"}));
        let err = handler.handle(&job).await.unwrap_err();
        assert!(matches!(err, JobError::Unrecoverable(_)));
    }

    #[tokio::test]
    async fn missing_task_is_recoverable() {
        let handler = StatusUpdateHandler::new(seeded_store());

        let job = status_job(json!({"taskId": "ghost", "status": "pending"}));
        let err = handler.handle(&job).await.unwrap_err();
        assert!(matches!(
            err,
            JobError::Recoverable(PipelineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn store_outage_is_recoverable() {
        let store = seeded_store();
        store.fail_next_set_status(1);
        let handler = StatusUpdateHandler::new(store);

        let job = status_job(json!({"taskId": "t1", "status": "pending"}));
        let err = handler.handle(&job).await.unwrap_err();
        assert!(matches!(
            err,
            JobError::Recoverable(PipelineError::Store(_))
        ));
    }
}
