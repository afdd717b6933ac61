//! # Sessions
//!
//! A [`Session`] is the proof that somebody is signed in: the account id plus
//! whatever the sign-in provider told us about them. Where it is kept is
//! behind [`SessionStore`]:
//!
//! - [`MemorySession`] holds it in process memory (tests, embedded use);
//! - `tower_sessions::Session` (feature `server`) keeps it in the cookie-keyed
//!   server-side session of the current HTTP client.
//!
//! Storing a session always rotates the tower session id, so an id handed out
//! before sign-in is useless afterwards.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use store::Account;
use uuid::Uuid;

use crate::error::AppResult;

/// Key for storing the session in the session store.
pub const SESSION_KEY: &str = "session";

/// The currently authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    /// Provider the user signed in with.
    pub provider: String,
}

impl Session {
    pub fn from_account(account: &Account) -> Self {
        Self {
            user_id: account.id,
            email: account.email.clone(),
            name: account.name.clone(),
            avatar_url: account.avatar_url.clone(),
            provider: account.provider.clone(),
        }
    }

    /// Get display name, falling back to email, then to a placeholder.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("user")
    }
}

/// Where the current session lives.
pub trait SessionStore {
    fn load_session(&self) -> impl Future<Output = AppResult<Option<Session>>> + Send;
    fn store_session(&self, session: &Session) -> impl Future<Output = AppResult<()>> + Send;
    fn clear_session(&self) -> impl Future<Output = AppResult<()>> + Send;
}

/// Session slot held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    slot: Arc<Mutex<Option<Session>>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(session: Session) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(session))),
        }
    }

    fn with_slot<R>(&self, f: impl FnOnce(&mut Option<Session>) -> R) -> R {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut slot)
    }
}

impl SessionStore for MemorySession {
    async fn load_session(&self) -> AppResult<Option<Session>> {
        Ok(self.with_slot(|slot| slot.clone()))
    }

    async fn store_session(&self, session: &Session) -> AppResult<()> {
        self.with_slot(|slot| *slot = Some(session.clone()));
        Ok(())
    }

    async fn clear_session(&self) -> AppResult<()> {
        self.with_slot(|slot| *slot = None);
        Ok(())
    }
}

#[cfg(feature = "server")]
mod server_session {
    use super::{Session, SessionStore, SESSION_KEY};
    use crate::error::{AppError, AppResult};

    fn session_error(e: tower_sessions::session::Error) -> AppError {
        AppError::Session(e.to_string())
    }

    impl SessionStore for tower_sessions::Session {
        async fn load_session(&self) -> AppResult<Option<Session>> {
            self.get(SESSION_KEY).await.map_err(session_error)
        }

        async fn store_session(&self, session: &Session) -> AppResult<()> {
            self.cycle_id().await.map_err(session_error)?;
            self.insert(SESSION_KEY, session)
                .await
                .map_err(session_error)
        }

        async fn clear_session(&self) -> AppResult<()> {
            self.remove::<Session>(SESSION_KEY)
                .await
                .map_err(session_error)?;
            self.cycle_id().await.map_err(session_error)
        }
    }
}
