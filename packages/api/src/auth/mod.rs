//! # Sign-in methods
//!
//! One capability, [`CredentialProvider`], with three interchangeable
//! implementations. Exactly one is active per deployment; [`Provider`] picks it
//! from configuration ([`AuthMethod`]) and forwards every call.
//!
//! | Method | Type | Accounts live in | Notes |
//! |--------|------|------------------|-------|
//! | `local` | [`LocalProvider`] | JSON files ([`store::FileStore`]) | also keeps the `current_user` record |
//! | `password` | [`PasswordProvider`] | the configured store | sign-up requires a 6+ character password and a matching confirmation |
//! | `oauth` | [`OAuthProvider`] | the configured store | Kakao, GitHub or Google; Authorization Code + PKCE |
//!
//! Passwords are only ever stored as Argon2id hashes ([`hash_password`]).
//!
//! Operations a method does not offer (a password sign-in against the OAuth
//! method, sign-up with OAuth, an OAuth callback against a password method)
//! fail with [`AppError::Unsupported`].

mod config;
mod email;
mod local;
mod oauth;
mod password;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use store::{AccountStore, OAuthStateStore, ProfileStore};

pub use config::{OAuthConfig, OAuthService, DEFAULT_REDIRECT_URI};
pub use email::PasswordProvider;
pub use local::LocalProvider;
pub use oauth::OAuthProvider;
pub use password::{hash_password, verify_password};

use crate::error::{AppError, AppResult};
use crate::session::Session;

/// Which sign-in method a deployment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Local,
    Password,
    #[serde(rename = "oauth")]
    OAuth,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Password => "password",
            Self::OAuth => "oauth",
        })
    }
}

/// What the user submitted on the sign-in page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInRequest {
    Password { email: String, password: String },
    /// Start a redirect-based login with the configured OAuth service.
    OAuth,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignInOutcome {
    SignedIn(Session),
    /// Send the browser here to continue (provider consent page).
    Redirect(String),
}

/// Sign-up form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SignUpForm {
    #[serde(default)]
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Query parameters the OAuth service sends back to the callback route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthCallback {
    pub code: String,
    pub state: String,
}

/// The "authenticate" capability.
pub trait CredentialProvider {
    fn method(&self) -> AuthMethod;

    fn sign_in(
        &self,
        request: SignInRequest,
    ) -> impl Future<Output = AppResult<SignInOutcome>> + Send;

    fn sign_up(&self, _form: SignUpForm) -> impl Future<Output = AppResult<Session>> + Send {
        let method = self.method();
        async move { Err(AppError::Unsupported("Sign-up", method)) }
    }

    /// Finish a redirect-based login.
    fn complete(
        &self,
        _callback: OAuthCallback,
    ) -> impl Future<Output = AppResult<Session>> + Send {
        let method = self.method();
        async move { Err(AppError::Unsupported("OAuth callback", method)) }
    }

    /// Hook run after the session has been cleared.
    fn sign_out(&self, _session: &Session) -> impl Future<Output = AppResult<()>> + Send {
        async { Ok(()) }
    }
}

/// Trim and lowercase an email address.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// The sign-in method selected at configuration time.
pub enum Provider<S> {
    Local(LocalProvider),
    Password(PasswordProvider<S>),
    OAuth(OAuthProvider<S>),
}

impl<S> CredentialProvider for Provider<S>
where
    S: AccountStore + ProfileStore + OAuthStateStore + Send + Sync,
{
    fn method(&self) -> AuthMethod {
        match self {
            Self::Local(p) => p.method(),
            Self::Password(p) => p.method(),
            Self::OAuth(p) => p.method(),
        }
    }

    async fn sign_in(&self, request: SignInRequest) -> AppResult<SignInOutcome> {
        match self {
            Self::Local(p) => p.sign_in(request).await,
            Self::Password(p) => p.sign_in(request).await,
            Self::OAuth(p) => p.sign_in(request).await,
        }
    }

    async fn sign_up(&self, form: SignUpForm) -> AppResult<Session> {
        match self {
            Self::Local(p) => p.sign_up(form).await,
            Self::Password(p) => p.sign_up(form).await,
            Self::OAuth(p) => p.sign_up(form).await,
        }
    }

    async fn complete(&self, callback: OAuthCallback) -> AppResult<Session> {
        match self {
            Self::Local(p) => p.complete(callback).await,
            Self::Password(p) => p.complete(callback).await,
            Self::OAuth(p) => p.complete(callback).await,
        }
    }

    async fn sign_out(&self, session: &Session) -> AppResult<()> {
        match self {
            Self::Local(p) => p.sign_out(session).await,
            Self::Password(p) => p.sign_out(session).await,
            Self::OAuth(p) => p.sign_out(session).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::MemoryStore;

    #[test]
    fn test_auth_method_names() {
        assert_eq!(AuthMethod::OAuth.to_string(), "oauth");
        assert_eq!(AuthMethod::Local.to_string(), "local");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  A@B.Com "), "a@b.com");
    }

    #[tokio::test]
    async fn test_provider_forwards_to_selected_method() {
        let provider = Provider::Password(PasswordProvider::new(MemoryStore::new()));
        assert_eq!(provider.method(), AuthMethod::Password);

        let err = provider
            .complete(OAuthCallback {
                code: "code".to_string(),
                state: "state".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unsupported(_, AuthMethod::Password)));
    }
}
