//! # Task list view-model
//!
//! [`TaskList`] holds one user's tasks in display order (newest first) and
//! applies changes to the store before touching its own copy. A failed call
//! leaves the list exactly as it was; the error is logged and returned so the
//! caller can show [`AppError::notice`].

use store::{StoreError, Task, TaskStore};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::notice::Notice;

pub struct TaskList<S> {
    store: S,
    user_id: Uuid,
    tasks: Vec<Task>,
}

fn logged<T>(result: AppResult<T>, action: &str, user_id: Uuid) -> AppResult<T> {
    if let Err(e) = &result {
        if !e.is_user_error() {
            error!("Failed to {} for {}: {}", action, user_id, e);
        }
    }
    result
}

impl<S: TaskStore + Sync> TaskList<S> {
    /// An empty list; call [`load`](Self::load) to fetch rows.
    pub fn new(store: S, user_id: Uuid) -> Self {
        Self {
            store,
            user_id,
            tasks: Vec::new(),
        }
    }

    /// Build the list and fetch the user's tasks.
    pub async fn load(store: S, user_id: Uuid) -> AppResult<Self> {
        let mut list = Self::new(store, user_id);
        list.reload().await?;
        Ok(list)
    }

    /// Replace the list with what the store holds now.
    pub async fn reload(&mut self) -> AppResult<()> {
        let result = self.store.list_tasks(self.user_id).await.map_err(AppError::from);
        self.tasks = logged(result, "load tasks", self.user_id)?;
        Ok(())
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    pub async fn add(&mut self, title: &str) -> AppResult<Notice> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::validation("Please enter a title."));
        }

        let result = self
            .store
            .insert_task(self.user_id, title)
            .await
            .map_err(AppError::from);
        let task = logged(result, "add task", self.user_id)?;

        info!("Added task {} for {}", task.id, self.user_id);
        self.tasks.insert(0, task);
        Ok(Notice::success("Task added", "A new task was added."))
    }

    /// Flip the completion flag of `id`, which must be in the list.
    pub async fn toggle(&mut self, id: Uuid) -> AppResult<Notice> {
        let Some(index) = self.tasks.iter().position(|t| t.id == id) else {
            return Err(StoreError::NotFound.into());
        };
        let completed = !self.tasks[index].completed;

        let result = self
            .store
            .set_task_completed(self.user_id, id, completed)
            .await
            .map_err(AppError::from);
        self.tasks[index] = logged(result, "update task", self.user_id)?;

        let description = if completed {
            "The task was marked as done."
        } else {
            "The task was marked as not done."
        };
        Ok(Notice::success("Task updated", description))
    }

    pub async fn delete(&mut self, id: Uuid) -> AppResult<Notice> {
        let result = self
            .store
            .delete_task(self.user_id, id)
            .await
            .map_err(AppError::from);
        logged(result, "delete task", self.user_id)?;

        info!("Deleted task {} for {}", id, self.user_id);
        self.tasks.retain(|t| t.id != id);
        Ok(Notice::success("Task deleted", "The task was deleted."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use store::{MemoryStore, StoreResult};

    /// Counts calls and fails writes on demand.
    #[derive(Clone, Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: Arc<AtomicBool>,
        calls: Arc<AtomicUsize>,
    }

    impl FlakyStore {
        fn check(&self) -> StoreResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("connection refused".to_string()));
            }
            Ok(())
        }
    }

    impl TaskStore for FlakyStore {
        async fn list_tasks(&self, user_id: Uuid) -> StoreResult<Vec<Task>> {
            self.inner.list_tasks(user_id).await
        }

        async fn insert_task(&self, user_id: Uuid, title: &str) -> StoreResult<Task> {
            self.check()?;
            self.inner.insert_task(user_id, title).await
        }

        async fn set_task_completed(
            &self,
            user_id: Uuid,
            id: Uuid,
            completed: bool,
        ) -> StoreResult<Task> {
            self.check()?;
            self.inner.set_task_completed(user_id, id, completed).await
        }

        async fn delete_task(&self, user_id: Uuid, id: Uuid) -> StoreResult<()> {
            self.check()?;
            self.inner.delete_task(user_id, id).await
        }
    }

    #[tokio::test]
    async fn test_add_prepends_newest() {
        let mut list = TaskList::load(MemoryStore::new(), Uuid::new_v4())
            .await
            .unwrap();
        list.add("Buy milk").await.unwrap();
        list.add("Walk dog").await.unwrap();

        let titles: Vec<&str> = list.tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["Walk dog", "Buy milk"]);
        assert!(list.tasks().iter().all(|t| !t.completed));

        // The store agrees with the local order
        list.reload().await.unwrap();
        let titles: Vec<&str> = list.tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["Walk dog", "Buy milk"]);
    }

    #[tokio::test]
    async fn test_blank_title_never_reaches_store() {
        let store = FlakyStore::default();
        let mut list = TaskList::new(store.clone(), Uuid::new_v4());

        let err = list.add("   ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert!(list.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_state() {
        let mut list = TaskList::new(MemoryStore::new(), Uuid::new_v4());
        list.add("Buy milk").await.unwrap();
        list.add("Walk dog").await.unwrap();
        list.add("Pay rent").await.unwrap();
        let ids: Vec<Uuid> = list.tasks().iter().map(|t| t.id).collect();
        let middle = ids[1];

        list.toggle(middle).await.unwrap();
        assert!(list.tasks()[1].completed);
        assert_eq!(list.tasks().iter().filter(|t| t.completed).count(), 1);

        list.toggle(middle).await.unwrap();
        assert!(list.tasks().iter().all(|t| !t.completed));
        assert_eq!(list.tasks().len(), 3);
        assert_eq!(list.tasks().iter().map(|t| t.id).collect::<Vec<_>>(), ids);
    }

    #[tokio::test]
    async fn test_delete_removes_task() {
        let mut list = TaskList::new(MemoryStore::new(), Uuid::new_v4());
        list.add("Buy milk").await.unwrap();
        list.add("Walk dog").await.unwrap();
        let id = list.tasks()[1].id;

        list.delete(id).await.unwrap();
        assert_eq!(list.tasks().len(), 1);
        assert!(list.tasks().iter().all(|t| t.id != id));
    }

    #[tokio::test]
    async fn test_failures_leave_list_unchanged() {
        let store = FlakyStore::default();
        let mut list = TaskList::new(store.clone(), Uuid::new_v4());
        list.add("Buy milk").await.unwrap();
        let before = list.tasks().to_vec();
        let id = before[0].id;

        store.fail_writes.store(true, Ordering::SeqCst);
        for result in [
            list.add("Walk dog").await,
            list.toggle(id).await,
            list.delete(id).await,
        ] {
            let err = result.unwrap_err();
            assert_eq!(err.notice(), Notice::generic_error());
        }
        assert_eq!(list.tasks(), before.as_slice());
    }

    #[tokio::test]
    async fn test_tasks_are_private_to_their_owner() {
        let store = MemoryStore::new();
        let mut alice = TaskList::new(store.clone(), Uuid::new_v4());
        alice.add("Buy milk").await.unwrap();
        let id = alice.tasks()[0].id;

        let mut bob = TaskList::load(store.clone(), Uuid::new_v4()).await.unwrap();
        assert!(bob.tasks().is_empty());

        let err = bob.delete(id).await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::NotFound)));

        alice.reload().await.unwrap();
        assert_eq!(alice.tasks().len(), 1);
    }
}
