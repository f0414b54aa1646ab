// In-memory TaskStore adapter
//
// Backs the TaskStore port with a RwLock-protected map and real buffered
// transactions: writes are staged on the transaction and applied atomically
// on commit, discarded on rollback.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use taskpipe_core::domain::{NewTask, Task, TaskFilter, TaskId, TaskPage, TaskPatch, TaskStatus};
use taskpipe_core::error::{PipelineError, Result};
use taskpipe_core::port::{TaskStore, TaskStoreTransaction, TimeProvider, Transaction};
use tokio::sync::RwLock;
use tracing::debug;

struct Shared {
    tasks: RwLock<HashMap<TaskId, Task>>,
    time_provider: Arc<dyn TimeProvider>,
    find_page_calls: AtomicU64,
    writes: AtomicU64,
}

pub struct InMemoryTaskStore {
    shared: Arc<Shared>,
}

impl InMemoryTaskStore {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            shared: Arc::new(Shared {
                tasks: RwLock::new(HashMap::new()),
                time_provider,
                find_page_calls: AtomicU64::new(0),
                writes: AtomicU64::new(0),
            }),
        }
    }

    /// Insert a task directly, bypassing the transactional surface
    /// (test seeding and demo data).
    pub async fn seed(&self, task: Task) {
        self.shared
            .tasks
            .write()
            .await
            .insert(task.id.clone(), task);
    }

    pub async fn task(&self, id: &str) -> Option<Task> {
        self.shared.tasks.read().await.get(id).cloned()
    }

    pub async fn task_count(&self) -> usize {
        self.shared.tasks.read().await.len()
    }

    /// Number of find_page calls served (pagination assertions in tests).
    pub fn find_page_calls(&self) -> u64 {
        self.shared.find_page_calls.load(Ordering::SeqCst)
    }

    /// Number of task rows written, via set_status or committed
    /// transactions (idempotency assertions in tests).
    pub fn write_count(&self) -> u64 {
        self.shared.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn begin(&self) -> Result<Box<dyn TaskStoreTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            shared: Arc::clone(&self.shared),
            staged: HashMap::new(),
        }))
    }

    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self.shared.tasks.read().await.get(id).cloned())
    }

    async fn find_page(&self, filter: &TaskFilter, page: u32, page_size: u32) -> Result<TaskPage> {
        self.shared.find_page_calls.fetch_add(1, Ordering::SeqCst);

        let tasks = self.shared.tasks.read().await;
        let mut matching: Vec<&Task> = tasks.values().filter(|t| filter.matches(t)).collect();
        // Deterministic order so offsets genuinely advance across pages.
        matching.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

        let total = matching.len() as u64;
        let offset = (page.max(1) as usize - 1) * page_size as usize;
        let items = matching
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .cloned()
            .collect();

        debug!(page, page_size, total, "Served task page");
        Ok(TaskPage { items, total })
    }

    async fn set_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task> {
        let mut tasks = self.shared.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| PipelineError::NotFound(format!("task {}", id)))?;
        task.status = status;
        self.shared.writes.fetch_add(1, Ordering::SeqCst);
        Ok(task.clone())
    }
}

struct InMemoryTransaction {
    shared: Arc<Shared>,
    /// Read-your-writes overlay, applied to the base map on commit.
    staged: HashMap<TaskId, Task>,
}

impl InMemoryTransaction {
    async fn read_task(&self, id: &TaskId) -> Option<Task> {
        if let Some(task) = self.staged.get(id) {
            return Some(task.clone());
        }
        self.shared.tasks.read().await.get(id).cloned()
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        let mut tasks = self.shared.tasks.write().await;
        let writes = self.staged.len() as u64;
        tasks.extend(self.staged);
        self.shared.writes.fetch_add(writes, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        // Staged writes never reached the base map; dropping them is enough.
        Ok(())
    }
}

#[async_trait]
impl TaskStoreTransaction for InMemoryTransaction {
    async fn create_task(&mut self, attrs: NewTask) -> Result<Task> {
        let task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            title: attrs.title,
            status: attrs.status,
            priority: attrs.priority,
            due_date: attrs.due_date,
            user_id: attrs.user_id,
            user_email: attrs.user_email,
            created_at: self.shared.time_provider.now_millis(),
        };
        self.staged.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn find_by_id(&mut self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self.read_task(id).await)
    }

    async fn update_task(&mut self, id: &TaskId, patch: TaskPatch) -> Result<Task> {
        let mut task = self
            .read_task(id)
            .await
            .ok_or_else(|| PipelineError::NotFound(format!("task {}", id)))?;

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = Some(due_date);
        }

        self.staged.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn set_status_bulk(
        &mut self,
        ids: &[TaskId],
        status: TaskStatus,
    ) -> Result<Vec<TaskId>> {
        let mut affected = Vec::new();
        for id in ids {
            if let Some(mut task) = self.read_task(id).await {
                task.status = status;
                self.staged.insert(id.clone(), task);
                affected.push(id.clone());
            }
        }
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskpipe_core::port::time_provider::mocks::MockTimeProvider;

    fn store() -> InMemoryTaskStore {
        InMemoryTaskStore::new(Arc::new(MockTimeProvider::new(1_000)))
    }

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let store = store();
        let mut tx = store.begin().await.unwrap();
        let task = tx.create_task(NewTask::new("draft")).await.unwrap();

        assert!(store.task(&task.id).await.is_none());
        tx.commit().await.unwrap();
        assert!(store.task(&task.id).await.is_some());
    }

    #[tokio::test]
    async fn rollback_discards_staged_writes() {
        let store = store();
        let mut tx = store.begin().await.unwrap();
        let task = tx.create_task(NewTask::new("draft")).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(store.task(&task.id).await.is_none());
        assert_eq!(store.task_count().await, 0);
    }

    #[tokio::test]
    async fn transaction_reads_its_own_writes() {
        let store = store();
        let mut tx = store.begin().await.unwrap();
        let task = tx.create_task(NewTask::new("draft")).await.unwrap();

        let seen = tx.find_by_id(&task.id).await.unwrap();
        assert_eq!(seen.unwrap().id, task.id);

        let patched = tx
            .update_task(
                &task.id,
                TaskPatch {
                    status: Some(TaskStatus::InProgress),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn pages_advance_deterministically() {
        let store = store();
        for n in 0..7 {
            let mut tx = store.begin().await.unwrap();
            let mut attrs = NewTask::new(format!("t{}", n));
            attrs.due_date = Some(500);
            tx.create_task(attrs).await.unwrap();
            tx.commit().await.unwrap();
        }

        let filter = TaskFilter {
            due_before: Some(1_000),
            status: Some(TaskStatus::Pending),
            user_id: None,
        };
        let first = store.find_page(&filter, 1, 3).await.unwrap();
        let second = store.find_page(&filter, 2, 3).await.unwrap();
        let third = store.find_page(&filter, 3, 3).await.unwrap();

        assert_eq!(first.total, 7);
        assert_eq!(
            (first.items.len(), second.items.len(), third.items.len()),
            (3, 3, 1)
        );

        let mut seen: Vec<String> = first
            .items
            .iter()
            .chain(&second.items)
            .chain(&third.items)
            .map(|t| t.id.clone())
            .collect();
        seen.dedup();
        assert_eq!(seen.len(), 7, "no task repeats across pages");
    }

    #[tokio::test]
    async fn set_status_reports_missing_tasks() {
        let store = store();
        let err = store
            .set_status(&"ghost".to_string(), TaskStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }
}
