//! # JSON-file-backed store
//!
//! [`FileStore`] keeps every collection as a JSON array in its own file. It
//! backs the local-store sign-in method (accounts and the `current_user`
//! record never leave the machine) and the `file` storage backend.
//!
//! ## Layout
//!
//! ```text
//! <base_dir>/
//! ├── users.json          # [Account]
//! ├── profiles.json       # [Profile]
//! ├── todos.json          # [Task], insertion order
//! ├── oauth_states.json   # [PendingLogin]
//! └── current_user.json   # CurrentUser, absent when signed out
//! ```
//!
//! A missing file reads as an empty collection. Writes go through a
//! read-modify-write cycle under a process-local lock, so concurrent requests
//! in one server never lose each other's rows.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{newest_first, Account, CurrentUser, PendingLogin, Profile, Task};
use crate::repo::{AccountStore, OAuthStateStore, ProfileStore, TaskStore};

const USERS: &str = "users.json";
const PROFILES: &str = "profiles.json";
const TODOS: &str = "todos.json";
const OAUTH_STATES: &str = "oauth_states.json";
const CURRENT_USER: &str = "current_user.json";

/// Filesystem-backed store.
#[derive(Clone, Debug)]
pub struct FileStore {
    base: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            write_lock: Arc::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }

    fn read_value<T: DeserializeOwned>(&self, name: &str) -> StoreResult<Option<T>> {
        match fs::read(self.path(name)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn read_all<T: DeserializeOwned>(&self, name: &str) -> StoreResult<Vec<T>> {
        Ok(self.read_value(name)?.unwrap_or_default())
    }

    fn write_value<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> StoreResult<()> {
        fs::create_dir_all(&self.base)?;
        let path = self.path(name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    /// The persisted signed-in user, if any.
    pub fn current_user(&self) -> StoreResult<Option<CurrentUser>> {
        self.read_value(CURRENT_USER)
    }

    pub fn set_current_user(&self, user: &CurrentUser) -> StoreResult<()> {
        let _guard = self.lock();
        self.write_value(CURRENT_USER, user)
    }

    pub fn clear_current_user(&self) -> StoreResult<()> {
        let _guard = self.lock();
        match fs::remove_file(self.path(CURRENT_USER)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

impl AccountStore for FileStore {
    async fn find_account(&self, provider: &str, provider_id: &str) -> StoreResult<Option<Account>> {
        let accounts: Vec<Account> = self.read_all(USERS)?;
        Ok(accounts
            .into_iter()
            .find(|a| a.provider == provider && a.provider_id == provider_id))
    }

    async fn insert_account(&self, account: Account) -> StoreResult<Account> {
        let _guard = self.lock();
        let mut accounts: Vec<Account> = self.read_all(USERS)?;
        if accounts
            .iter()
            .any(|a| a.provider == account.provider && a.provider_id == account.provider_id)
        {
            return Err(StoreError::Conflict(format!(
                "{} account {} already exists",
                account.provider, account.provider_id
            )));
        }
        accounts.push(account.clone());
        self.write_value(USERS, &accounts)?;
        Ok(account)
    }

    async fn upsert_account(&self, account: Account) -> StoreResult<Account> {
        let _guard = self.lock();
        let mut accounts: Vec<Account> = self.read_all(USERS)?;
        let stored = match accounts
            .iter_mut()
            .find(|a| a.provider == account.provider && a.provider_id == account.provider_id)
        {
            Some(row) => {
                row.email = account.email;
                row.name = account.name;
                row.avatar_url = account.avatar_url;
                row.updated_at = Utc::now();
                row.clone()
            }
            None => {
                accounts.push(account.clone());
                account
            }
        };
        self.write_value(USERS, &accounts)?;
        Ok(stored)
    }
}

impl ProfileStore for FileStore {
    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        let profiles: Vec<Profile> = self.read_all(PROFILES)?;
        Ok(profiles.into_iter().find(|p| p.id == id))
    }

    async fn upsert_profile(&self, profile: Profile) -> StoreResult<Profile> {
        let _guard = self.lock();
        let mut profiles: Vec<Profile> = self.read_all(PROFILES)?;
        match profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(row) => *row = profile.clone(),
            None => profiles.push(profile.clone()),
        }
        self.write_value(PROFILES, &profiles)?;
        Ok(profile)
    }
}

impl TaskStore for FileStore {
    async fn list_tasks(&self, user_id: Uuid) -> StoreResult<Vec<Task>> {
        let tasks: Vec<Task> = self.read_all(TODOS)?;
        Ok(newest_first(tasks.iter().filter(|t| t.user_id == user_id)))
    }

    async fn insert_task(&self, user_id: Uuid, title: &str) -> StoreResult<Task> {
        let _guard = self.lock();
        let mut tasks: Vec<Task> = self.read_all(TODOS)?;
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            completed: false,
            created_at: now,
            updated_at: now,
        };
        tasks.push(task.clone());
        self.write_value(TODOS, &tasks)?;
        Ok(task)
    }

    async fn set_task_completed(&self, user_id: Uuid, id: Uuid, completed: bool) -> StoreResult<Task> {
        let _guard = self.lock();
        let mut tasks: Vec<Task> = self.read_all(TODOS)?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id && t.user_id == user_id)
            .ok_or(StoreError::NotFound)?;
        task.completed = completed;
        task.updated_at = Utc::now();
        let updated = task.clone();
        self.write_value(TODOS, &tasks)?;
        Ok(updated)
    }

    async fn delete_task(&self, user_id: Uuid, id: Uuid) -> StoreResult<()> {
        let _guard = self.lock();
        let mut tasks: Vec<Task> = self.read_all(TODOS)?;
        let before = tasks.len();
        tasks.retain(|t| !(t.id == id && t.user_id == user_id));
        if tasks.len() == before {
            return Err(StoreError::NotFound);
        }
        self.write_value(TODOS, &tasks)
    }
}

impl OAuthStateStore for FileStore {
    async fn put_pending_login(&self, login: PendingLogin) -> StoreResult<()> {
        let _guard = self.lock();
        let mut logins: Vec<PendingLogin> = self.read_all(OAUTH_STATES)?;
        let now = Utc::now();
        logins.retain(|l| l.expires_at > now && l.state != login.state);
        logins.push(login);
        self.write_value(OAUTH_STATES, &logins)
    }

    async fn take_pending_login(
        &self,
        state: &str,
        provider: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<String>> {
        let _guard = self.lock();
        let mut logins: Vec<PendingLogin> = self.read_all(OAUTH_STATES)?;
        let Some(index) = logins
            .iter()
            .position(|l| l.state == state && l.provider == provider)
        else {
            return Ok(None);
        };
        let login = logins.remove(index);
        self.write_value(OAUTH_STATES, &logins)?;
        Ok((login.expires_at > now).then_some(login.pkce_verifier))
    }
}
