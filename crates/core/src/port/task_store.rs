// Task Store Port (persistence boundary)
//
// The relational store holding tasks and users is an external collaborator;
// the pipeline consumes it through this interface only.

use crate::domain::{NewTask, Task, TaskFilter, TaskId, TaskPage, TaskPatch, TaskStatus};
use crate::error::Result;
use crate::port::transaction::Transaction;
use async_trait::async_trait;

/// Repository interface for Task persistence
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Begin a transaction covering task writes paired with job enqueues
    async fn begin(&self) -> Result<Box<dyn TaskStoreTransaction>>;

    /// Find task by ID
    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>>;

    /// Filtered, offset-paginated read. `page` is 1-indexed.
    ///
    /// Implementations must genuinely advance across pages; the sweep's
    /// termination depends on it.
    async fn find_page(&self, filter: &TaskFilter, page: u32, page_size: u32) -> Result<TaskPage>;

    /// Write a task's status. Returns NotFound if the task is absent.
    async fn set_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task>;
}

/// TaskStore operations within a transaction
#[async_trait]
pub trait TaskStoreTransaction: Transaction {
    /// Insert a new task (within transaction)
    async fn create_task(&mut self, attrs: NewTask) -> Result<Task>;

    /// Find task by ID, seeing this transaction's own writes
    async fn find_by_id(&mut self, id: &TaskId) -> Result<Option<Task>>;

    /// Apply a partial update. Returns NotFound if the task is absent.
    async fn update_task(&mut self, id: &TaskId, patch: TaskPatch) -> Result<Task>;

    /// Set the status of every listed task in one store operation.
    /// Returns the ids that were actually affected; absent ids are skipped.
    async fn set_status_bulk(&mut self, ids: &[TaskId], status: TaskStatus)
        -> Result<Vec<TaskId>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::PipelineError;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex, PoisonError};

    #[derive(Default)]
    struct MockState {
        tasks: BTreeMap<TaskId, Task>,
        seq: u64,
        set_status_calls: u32,
        fail_next_set_status: u32,
        find_page_calls: u32,
    }

    /// In-memory TaskStore double with scriptable failures and call counts.
    ///
    /// Transactions write through immediately and keep a snapshot for
    /// rollback, which is enough for single-flow unit tests.
    pub struct MockTaskStore {
        state: Arc<Mutex<MockState>>,
    }

    impl MockTaskStore {
        pub fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(MockState::default())),
            }
        }

        /// Seed a task directly, bypassing the transactional surface.
        pub fn seed(&self, task: Task) {
            self.lock().tasks.insert(task.id.clone(), task);
        }

        /// Fail the next `n` set_status calls with a transient store error.
        pub fn fail_next_set_status(&self, n: u32) {
            self.lock().fail_next_set_status = n;
        }

        pub fn set_status_calls(&self) -> u32 {
            self.lock().set_status_calls
        }

        pub fn find_page_calls(&self) -> u32 {
            self.lock().find_page_calls
        }

        pub fn task(&self, id: &str) -> Option<Task> {
            self.lock().tasks.get(id).cloned()
        }

        pub fn task_count(&self) -> usize {
            self.lock().tasks.len()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl Default for MockTaskStore {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl TaskStore for MockTaskStore {
        async fn begin(&self) -> Result<Box<dyn TaskStoreTransaction>> {
            let snapshot = self.lock().tasks.clone();
            Ok(Box::new(MockTransaction {
                state: Arc::clone(&self.state),
                snapshot,
            }))
        }

        async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>> {
            Ok(self.lock().tasks.get(id).cloned())
        }

        async fn find_page(
            &self,
            filter: &TaskFilter,
            page: u32,
            page_size: u32,
        ) -> Result<TaskPage> {
            let mut state = self.lock();
            state.find_page_calls += 1;

            let matching: Vec<Task> = state
                .tasks
                .values()
                .filter(|t| filter.matches(t))
                .cloned()
                .collect();
            let total = matching.len() as u64;
            let offset = (page.max(1) as usize - 1) * page_size as usize;
            let items = matching
                .into_iter()
                .skip(offset)
                .take(page_size as usize)
                .collect();

            Ok(TaskPage { items, total })
        }

        async fn set_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task> {
            let mut state = self.lock();
            state.set_status_calls += 1;

            if state.fail_next_set_status > 0 {
                state.fail_next_set_status -= 1;
                return Err(PipelineError::Store(
                    "simulated transient store outage".to_string(),
                ));
            }

            match state.tasks.get_mut(id) {
                Some(task) => {
                    task.status = status;
                    Ok(task.clone())
                }
                None => Err(PipelineError::NotFound(format!("task {}", id))),
            }
        }
    }

    struct MockTransaction {
        state: Arc<Mutex<MockState>>,
        snapshot: BTreeMap<TaskId, Task>,
    }

    impl MockTransaction {
        fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    #[async_trait]
    impl Transaction for MockTransaction {
        async fn commit(self: Box<Self>) -> Result<()> {
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<()> {
            self.lock().tasks = self.snapshot.clone();
            Ok(())
        }
    }

    #[async_trait]
    impl TaskStoreTransaction for MockTransaction {
        async fn create_task(&mut self, attrs: NewTask) -> Result<Task> {
            let mut state = self.lock();
            state.seq += 1;
            let task = Task {
                id: format!("task-{}", state.seq),
                title: attrs.title,
                status: attrs.status,
                priority: attrs.priority,
                due_date: attrs.due_date,
                user_id: attrs.user_id,
                user_email: attrs.user_email,
                created_at: state.seq as i64,
            };
            state.tasks.insert(task.id.clone(), task.clone());
            Ok(task)
        }

        async fn find_by_id(&mut self, id: &TaskId) -> Result<Option<Task>> {
            Ok(self.lock().tasks.get(id).cloned())
        }

        async fn update_task(&mut self, id: &TaskId, patch: TaskPatch) -> Result<Task> {
            let mut state = self.lock();
            let task = state
                .tasks
                .get_mut(id)
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
            Ok(task.clone())
        }

        async fn set_status_bulk(
            &mut self,
            ids: &[TaskId],
            status: TaskStatus,
        ) -> Result<Vec<TaskId>> {
            let mut state = self.lock();
            let mut affected = Vec::new();
            for id in ids {
                if let Some(task) = state.tasks.get_mut(id) {
                    task.status = status;
                    affected.push(id.clone());
                }
            }
            Ok(affected)
        }
    }
}
