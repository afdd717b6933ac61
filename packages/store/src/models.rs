//! # Records persisted by the store
//!
//! Plain data structures shared by every [`crate::repo`] backend. They are
//! `Serialize + Deserialize` so the [`crate::FileStore`] can keep them as JSON
//! and the web layer can hand them straight to clients.
//!
//! ## Types
//!
//! | Struct | Represents |
//! |--------|-----------|
//! | [`Account`] | A sign-in identity. `provider` is `"local"`, `"email"`, or an OAuth service name; `provider_id` is the email for credential accounts and the service's user id otherwise. |
//! | [`Profile`] | One row per account with the onboarding fields and the `is_profile_completed` flag. |
//! | [`Task`] | A to-do item owned by exactly one account. `created_at` is always assigned by the store. |
//! | [`CurrentUser`] | The persisted "who is signed in" record of the local-store sign-in method. |
//! | [`PendingLogin`] | CSRF state and PKCE verifier of an OAuth login that has not come back yet. |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provider name for accounts kept in local JSON storage.
pub const PROVIDER_LOCAL: &str = "local";

/// Provider name for email + password accounts.
pub const PROVIDER_EMAIL: &str = "email";

/// A sign-in identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub provider: String,
    pub provider_id: String,
    /// Argon2 PHC string, only for credential accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Build a fresh account with a random id.
    pub fn new(provider: impl Into<String>, provider_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: None,
            name: None,
            avatar_url: None,
            provider: provider.into(),
            provider_id: provider_id.into(),
            password_hash: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Extended per-account attributes plus the onboarding flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Same as the owning [`Account::id`].
    pub id: Uuid,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub school: Option<String>,
    pub department: Option<String>,
    pub student_id: Option<String>,
    pub avatar_url: Option<String>,
    pub is_profile_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// An empty, not yet completed profile.
    pub fn empty(id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: None,
            phone_number: None,
            school: None,
            department: None,
            student_id: None,
            avatar_url: None,
            is_profile_completed: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A to-do item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    /// Owning account.
    pub user_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The signed-in user of the local-store method.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

/// An OAuth authorization that is waiting for its callback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingLogin {
    /// CSRF state sent to the provider.
    pub state: String,
    pub provider: String,
    pub pkce_verifier: String,
    pub expires_at: DateTime<Utc>,
}

/// Newest first, most recently inserted first among equal timestamps.
///
/// `tasks` must be in insertion order.
pub fn newest_first<'a>(tasks: impl DoubleEndedIterator<Item = &'a Task>) -> Vec<Task> {
    let mut sorted: Vec<Task> = tasks.rev().cloned().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted
}
