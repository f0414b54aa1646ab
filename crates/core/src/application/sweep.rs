// Overdue Sweep Handler
//
// Pages over every pending task past its due date and sends a best-effort
// notification per task. Reads and mail sends only, no store writes, so the
// whole sweep can be retried from page 1 without side effects beyond a
// duplicate email.

use crate::application::constants::SWEEP_PAGE_SIZE;
use crate::domain::{Job, Task, TaskFilter, TaskStatus};
use crate::error::{JobError, Result};
use crate::port::{Notifier, TaskStore, TimeProvider};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SweepPayload {
    triggered_at: i64,
}

#[derive(Clone)]
pub struct OverdueSweepHandler {
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
    time_provider: Arc<dyn TimeProvider>,
    page_size: u32,
}

impl OverdueSweepHandler {
    pub fn new(
        store: Arc<dyn TaskStore>,
        notifier: Arc<dyn Notifier>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            store,
            notifier,
            time_provider,
            page_size: SWEEP_PAGE_SIZE,
        }
    }

    /// Override the batch page size (tests only; production uses 100).
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Job entry point. A malformed payload is Unrecoverable; anything that
    /// escapes the sweep itself is Recoverable and retries the whole sweep.
    pub async fn handle(&self, job: &Job) -> std::result::Result<(), JobError> {
        let payload: SweepPayload = serde_json::from_value(job.payload.as_value().clone())
            .map_err(|e| {
                JobError::unrecoverable(format!("malformed overdue-sweep payload: {}", e))
            })?;

        let processed = self.run_sweep().await.map_err(JobError::Recoverable)?;
        info!(
            triggered_at = payload.triggered_at,
            processed, "Overdue sweep finished"
        );
        Ok(())
    }

    /// Scan all overdue pending tasks, page by page, and fan out
    /// notifications. Returns the total number of tasks processed.
    ///
    /// A short page (fewer rows than the page size, zero included) signals
    /// the last page, which bounds the loop at ceil(total/page_size) + 1
    /// fetches.
    pub async fn run_sweep(&self) -> Result<u64> {
        let now = self.time_provider.now_millis();
        let filter = TaskFilter {
            due_before: Some(now),
            status: Some(TaskStatus::Pending),
            user_id: None,
        };

        let mut page: u32 = 1;
        let mut processed: u64 = 0;

        loop {
            let batch = self.store.find_page(&filter, page, self.page_size).await?;
            let fetched = batch.items.len();
            debug!(page, fetched, total = batch.total, "Sweep page fetched");

            for task in batch.items {
                processed += 1;
                let email = match task.user_email.as_deref() {
                    Some(email) if !email.is_empty() => email,
                    // No assignee email: nothing to notify, not an error.
                    _ => continue,
                };
                if let Err(e) = self.send_overdue_mail(&task, email).await {
                    // One skipped item in an otherwise-continuing batch.
                    error!(
                        task_id = %task.id,
                        recipient = %email,
                        error = %e,
                        "Overdue notification failed, continuing sweep"
                    );
                }
            }

            if fetched < self.page_size as usize {
                break;
            }
            page += 1;
        }

        Ok(processed)
    }

    async fn send_overdue_mail(&self, task: &Task, to: &str) -> Result<()> {
        let subject = format!("Task overdue: {}", task.title);
        let body_html = format!(
            "<p>Your task <strong>{}</strong> is past its due date. Please review it.</p>",
            task.title
        );
        self.notifier.send_mail(to, &subject, &body_html).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobName, JobPayload, TaskPriority};
    use crate::port::notifier::mocks::MockNotifier;
    use crate::port::task_store::mocks::MockTaskStore;
    use crate::port::time_provider::mocks::MockTimeProvider;
    use serde_json::json;

    const NOW: i64 = 1_000_000;

    fn overdue_task(n: u32, email: Option<&str>) -> Task {
        Task {
            id: format!("t{:03}", n),
            title: format!("task {}", n),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            due_date: Some(NOW - 1_000),
            user_id: email.map(|_| format!("u{}", n)),
            user_email: email.map(str::to_string),
            created_at: n as i64,
        }
    }

    fn handler(
        store: Arc<MockTaskStore>,
        notifier: Arc<MockNotifier>,
        page_size: u32,
    ) -> OverdueSweepHandler {
        OverdueSweepHandler::new(store, notifier, Arc::new(MockTimeProvider::new(NOW)))
            .with_page_size(page_size)
    }

    #[tokio::test]
    async fn paginates_until_short_page() {
        let store = Arc::new(MockTaskStore::new());
        for n in 0..25 {
            store.seed(overdue_task(n, Some("a@example.com")));
        }
        let notifier = Arc::new(MockNotifier::new());
        let sweep = handler(store.clone(), notifier.clone(), 10);

        let processed = sweep.run_sweep().await.unwrap();

        assert_eq!(processed, 25);
        assert_eq!(notifier.sent_count(), 25);
        // 10, 10, 5: the short third page stops the loop.
        assert_eq!(store.find_page_calls(), 3);
    }

    #[tokio::test]
    async fn exact_multiple_needs_one_extra_empty_page() {
        let store = Arc::new(MockTaskStore::new());
        for n in 0..20 {
            store.seed(overdue_task(n, Some("a@example.com")));
        }
        let notifier = Arc::new(MockNotifier::new());
        let sweep = handler(store.clone(), notifier.clone(), 10);

        let processed = sweep.run_sweep().await.unwrap();
        assert_eq!(processed, 20);
        assert_eq!(store.find_page_calls(), 3, "10, 10, then the empty page");
    }

    #[tokio::test]
    async fn skips_tasks_without_assignee_email() {
        let store = Arc::new(MockTaskStore::new());
        store.seed(overdue_task(1, Some("a@example.com")));
        store.seed(overdue_task(2, None));
        store.seed(Task {
            user_email: Some(String::new()),
            ..overdue_task(3, Some("placeholder"))
        });
        let notifier = Arc::new(MockNotifier::new());
        let sweep = handler(store, notifier.clone(), 10);

        let processed = sweep.run_sweep().await.unwrap();

        assert_eq!(processed, 3, "skipped tasks still count as processed");
        assert_eq!(notifier.recipients(), vec!["a@example.com".to_string()]);
    }

    #[tokio::test]
    async fn one_failing_send_does_not_abort_the_batch() {
        let store = Arc::new(MockTaskStore::new());
        for n in 0..10 {
            store.seed(overdue_task(n, Some(&format!("u{}@example.com", n))));
        }
        let notifier = Arc::new(MockNotifier::new());
        notifier.fail_for("u4@example.com");
        let sweep = handler(store, notifier.clone(), 100);

        let processed = sweep.run_sweep().await.unwrap();

        assert_eq!(processed, 10);
        assert_eq!(notifier.sent_count(), 9);
        assert!(!notifier
            .recipients()
            .contains(&"u4@example.com".to_string()));
    }

    #[tokio::test]
    async fn ignores_non_overdue_and_non_pending_tasks() {
        let store = Arc::new(MockTaskStore::new());
        store.seed(overdue_task(1, Some("a@example.com")));
        store.seed(Task {
            due_date: Some(NOW + 60_000),
            ..overdue_task(2, Some("future@example.com"))
        });
        store.seed(Task {
            status: TaskStatus::Completed,
            ..overdue_task(3, Some("done@example.com"))
        });
        let notifier = Arc::new(MockNotifier::new());
        let sweep = handler(store, notifier.clone(), 100);

        let processed = sweep.run_sweep().await.unwrap();

        assert_eq!(processed, 1);
        assert_eq!(notifier.recipients(), vec!["a@example.com".to_string()]);
    }

    #[tokio::test]
    async fn malformed_payload_is_unrecoverable() {
        let store = Arc::new(MockTaskStore::new());
        let notifier = Arc::new(MockNotifier::new());
        let sweep = handler(store, notifier, 100);

        let job = Job::new_test(JobName::OverdueSweep, JobPayload::new(json!({})));
        let err = sweep.handle(&job).await.unwrap_err();
        assert!(matches!(err, JobError::Unrecoverable(_)));
    }
}
