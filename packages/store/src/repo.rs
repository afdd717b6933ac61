//! # Repository traits
//!
//! Every backend ([`crate::MemoryStore`], [`crate::FileStore`], and the
//! PostgreSQL store in the `api` crate) implements the same four async traits,
//! so the sign-in flows, the session gate and the task list never know where
//! rows actually live.
//!
//! | Trait | Table | Operations |
//! |-------|-------|------------|
//! | [`AccountStore`] | `accounts` | lookup by provider identity, insert, upsert |
//! | [`ProfileStore`] | `profiles` | point read by user id, upsert |
//! | [`TaskStore`] | `todos` | list by owner (newest first), insert, set completion, delete |
//! | [`OAuthStateStore`] | `oauth_states` | put, take-once with expiry |
//!
//! The futures are `Send` so callers can await them inside axum handlers.
//! Task writes are scoped by task id *and* owner; touching a row owned by
//! somebody else is reported as [`StoreError::NotFound`](crate::StoreError::NotFound).

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{Account, PendingLogin, Profile, Task};

/// Sign-in identities.
pub trait AccountStore {
    fn find_account(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> impl Future<Output = StoreResult<Option<Account>>> + Send;

    /// Insert a new account. Fails with `Conflict` when the
    /// `(provider, provider_id)` pair is already taken.
    fn insert_account(
        &self,
        account: Account,
    ) -> impl Future<Output = StoreResult<Account>> + Send;

    /// Insert, or refresh email/name/avatar of the existing account with the
    /// same `(provider, provider_id)`. The stored id is kept.
    fn upsert_account(
        &self,
        account: Account,
    ) -> impl Future<Output = StoreResult<Account>> + Send;
}

/// Per-account profiles.
pub trait ProfileStore {
    fn get_profile(&self, id: Uuid) -> impl Future<Output = StoreResult<Option<Profile>>> + Send;

    fn upsert_profile(
        &self,
        profile: Profile,
    ) -> impl Future<Output = StoreResult<Profile>> + Send;
}

/// To-do rows.
pub trait TaskStore {
    /// All tasks of `user_id`, newest first.
    fn list_tasks(&self, user_id: Uuid) -> impl Future<Output = StoreResult<Vec<Task>>> + Send;

    /// Insert a task. The store assigns id and timestamps.
    fn insert_task(
        &self,
        user_id: Uuid,
        title: &str,
    ) -> impl Future<Output = StoreResult<Task>> + Send;

    fn set_task_completed(
        &self,
        user_id: Uuid,
        id: Uuid,
        completed: bool,
    ) -> impl Future<Output = StoreResult<Task>> + Send;

    fn delete_task(&self, user_id: Uuid, id: Uuid) -> impl Future<Output = StoreResult<()>> + Send;
}

/// OAuth logins in flight.
pub trait OAuthStateStore {
    fn put_pending_login(
        &self,
        login: PendingLogin,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Remove the pending login for `state` and return its PKCE verifier.
    /// Returns `None` when unknown, issued for another provider, or expired.
    fn take_pending_login(
        &self,
        state: &str,
        provider: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Option<String>>> + Send;
}

/// Everything a running application needs from one backend.
pub trait DataStore:
    AccountStore + ProfileStore + TaskStore + OAuthStateStore + Clone + Send + Sync + 'static
{
}

impl<T> DataStore for T where
    T: AccountStore + ProfileStore + TaskStore + OAuthStateStore + Clone + Send + Sync + 'static
{
}
