use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{newest_first, Account, PendingLogin, Profile, Task};
use crate::repo::{AccountStore, OAuthStateStore, ProfileStore, TaskStore};

#[derive(Debug, Default)]
struct Tables {
    accounts: Vec<Account>,
    profiles: HashMap<Uuid, Profile>,
    /// Insertion order.
    tasks: Vec<Task>,
    logins: HashMap<String, PendingLogin>,
}

/// In-memory store for tests and the `memory` backend.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AccountStore for MemoryStore {
    async fn find_account(&self, provider: &str, provider_id: &str) -> StoreResult<Option<Account>> {
        Ok(self
            .tables()
            .accounts
            .iter()
            .find(|a| a.provider == provider && a.provider_id == provider_id)
            .cloned())
    }

    async fn insert_account(&self, account: Account) -> StoreResult<Account> {
        let mut tables = self.tables();
        if tables
            .accounts
            .iter()
            .any(|a| a.provider == account.provider && a.provider_id == account.provider_id)
        {
            return Err(StoreError::Conflict(format!(
                "{} account {} already exists",
                account.provider, account.provider_id
            )));
        }
        tables.accounts.push(account.clone());
        Ok(account)
    }

    async fn upsert_account(&self, account: Account) -> StoreResult<Account> {
        let mut tables = self.tables();
        let existing = tables
            .accounts
            .iter_mut()
            .find(|a| a.provider == account.provider && a.provider_id == account.provider_id);

        match existing {
            Some(row) => {
                row.email = account.email;
                row.name = account.name;
                row.avatar_url = account.avatar_url;
                row.updated_at = Utc::now();
                Ok(row.clone())
            }
            None => {
                tables.accounts.push(account.clone());
                Ok(account)
            }
        }
    }
}

impl ProfileStore for MemoryStore {
    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.tables().profiles.get(&id).cloned())
    }

    async fn upsert_profile(&self, profile: Profile) -> StoreResult<Profile> {
        self.tables().profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }
}

impl TaskStore for MemoryStore {
    async fn list_tasks(&self, user_id: Uuid) -> StoreResult<Vec<Task>> {
        let tables = self.tables();
        Ok(newest_first(
            tables.tasks.iter().filter(|t| t.user_id == user_id),
        ))
    }

    async fn insert_task(&self, user_id: Uuid, title: &str) -> StoreResult<Task> {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            completed: false,
            created_at: now,
            updated_at: now,
        };
        self.tables().tasks.push(task.clone());
        Ok(task)
    }

    async fn set_task_completed(&self, user_id: Uuid, id: Uuid, completed: bool) -> StoreResult<Task> {
        let mut tables = self.tables();
        let task = tables
            .tasks
            .iter_mut()
            .find(|t| t.id == id && t.user_id == user_id)
            .ok_or(StoreError::NotFound)?;
        task.completed = completed;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete_task(&self, user_id: Uuid, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables();
        let before = tables.tasks.len();
        tables.tasks.retain(|t| !(t.id == id && t.user_id == user_id));
        if tables.tasks.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

impl OAuthStateStore for MemoryStore {
    async fn put_pending_login(&self, login: PendingLogin) -> StoreResult<()> {
        let now = Utc::now();
        let mut tables = self.tables();
        tables.logins.retain(|_, l| l.expires_at > now);
        tables.logins.insert(login.state.clone(), login);
        Ok(())
    }

    async fn take_pending_login(
        &self,
        state: &str,
        provider: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<String>> {
        let mut tables = self.tables();
        let matches = tables
            .logins
            .get(state)
            .is_some_and(|l| l.provider == provider);
        if !matches {
            return Ok(None);
        }
        Ok(tables
            .logins
            .remove(state)
            .filter(|l| l.expires_at > now)
            .map(|l| l.pkce_verifier))
    }
}
