//! Sign-in against accounts kept in local JSON files.
//!
//! Besides the session, this method keeps a `current_user.json` record in the
//! data directory so a restarted process knows who was signed in last. The
//! record is shared by the whole process and only tracks the most recent
//! sign-in; who is signed in for a request is always the request's session.
//! Signing out clears the record only when it belongs to the user signing out.

use store::{Account, AccountStore, CurrentUser, FileStore, StoreError, PROVIDER_LOCAL};
use tracing::info;

use super::password::{hash_password, verify_password};
use super::{normalize_email, AuthMethod, CredentialProvider, SignInOutcome, SignInRequest, SignUpForm};
use crate::error::{AppError, AppResult};
use crate::profile::begin_onboarding;
use crate::session::Session;

#[derive(Clone)]
pub struct LocalProvider {
    store: FileStore,
}

fn remember(store: &FileStore, account: &Account) -> AppResult<()> {
    store.set_current_user(&CurrentUser {
        id: account.id,
        email: account.provider_id.clone(),
        name: account.name.clone(),
    })?;
    Ok(())
}

impl LocalProvider {
    pub fn new(store: FileStore) -> Self {
        Self { store }
    }

    /// The user recorded by the last sign-in, if still signed in.
    pub fn current_user(&self) -> AppResult<Option<CurrentUser>> {
        Ok(self.store.current_user()?)
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }
}

impl CredentialProvider for LocalProvider {
    fn method(&self) -> AuthMethod {
        AuthMethod::Local
    }

    async fn sign_in(&self, request: SignInRequest) -> AppResult<SignInOutcome> {
        let SignInRequest::Password { email, password } = request else {
            return Err(AppError::Unsupported("OAuth sign-in", self.method()));
        };
        let email = normalize_email(&email);
        if email.is_empty() || password.is_empty() {
            return Err(AppError::validation("Please enter your email and password."));
        }

        let account = self
            .store
            .find_account(PROVIDER_LOCAL, &email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;
        let valid = match account.password_hash.as_deref() {
            Some(hash) => verify_password(&password, hash)?,
            None => false,
        };
        if !valid {
            return Err(AppError::InvalidCredentials);
        }

        remember(&self.store, &account)?;
        info!("Local user signed in: {}", account.id);
        Ok(SignInOutcome::SignedIn(Session::from_account(&account)))
    }

    async fn sign_up(&self, form: SignUpForm) -> AppResult<Session> {
        let name = form.name.trim();
        let email = normalize_email(&form.email);
        if name.is_empty() || email.is_empty() || form.password.is_empty() {
            return Err(AppError::validation("Please fill in every field."));
        }

        if self
            .store
            .find_account(PROVIDER_LOCAL, &email)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateAccount);
        }

        let mut account = Account::new(PROVIDER_LOCAL, email.clone());
        account.email = Some(email);
        account.name = Some(name.to_string());
        account.password_hash = Some(hash_password(&form.password)?);

        let account = match self.store.insert_account(account).await {
            Ok(account) => account,
            Err(StoreError::Conflict(_)) => return Err(AppError::DuplicateAccount),
            Err(e) => return Err(e.into()),
        };
        begin_onboarding(&self.store, &account).await?;
        remember(&self.store, &account)?;

        info!("Created local account {}", account.id);
        Ok(Session::from_account(&account))
    }

    async fn sign_out(&self, session: &Session) -> AppResult<()> {
        match self.store.current_user()? {
            Some(current) if current.id == session.user_id => {
                self.store.clear_current_user()?;
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::ProfileStore;

    fn provider() -> (tempfile::TempDir, LocalProvider) {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalProvider::new(FileStore::new(dir.path()));
        (dir, provider)
    }

    fn sign_up_form(name: &str, email: &str, password: &str) -> SignUpForm {
        SignUpForm {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: String::new(),
        }
    }

    #[tokio::test]
    async fn test_sign_up_records_current_user_and_pending_profile() {
        let (_dir, provider) = provider();
        let session = provider
            .sign_up(sign_up_form("홍길동", "a@b.com", "secret1"))
            .await
            .unwrap();

        let current = provider.current_user().unwrap().unwrap();
        assert_eq!(current.id, session.user_id);
        assert_eq!(current.email, "a@b.com");

        let profile = provider
            .store()
            .get_profile(session.user_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!profile.is_profile_completed);
    }

    #[tokio::test]
    async fn test_password_is_not_stored_in_plaintext() {
        let (dir, provider) = provider();
        provider
            .sign_up(sign_up_form("홍길동", "a@b.com", "secret1"))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(dir.path().join("users.json")).unwrap();
        assert!(!raw.contains("secret1"));
    }

    #[tokio::test]
    async fn test_sign_up_requires_name_and_rejects_duplicates() {
        let (_dir, provider) = provider();
        let err = provider
            .sign_up(sign_up_form("", "a@b.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        provider
            .sign_up(sign_up_form("홍길동", "a@b.com", "secret1"))
            .await
            .unwrap();
        let err = provider
            .sign_up(sign_up_form("Other", "a@b.com", "secret2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateAccount));
    }

    #[tokio::test]
    async fn test_sign_in_and_sign_out() {
        let (_dir, provider) = provider();
        let session = provider
            .sign_up(sign_up_form("홍길동", "a@b.com", "secret1"))
            .await
            .unwrap();
        provider.sign_out(&session).await.unwrap();
        assert!(provider.current_user().unwrap().is_none());

        let err = provider
            .sign_in(SignInRequest::Password {
                email: "a@b.com".to_string(),
                password: "wrong".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));

        let outcome = provider
            .sign_in(SignInRequest::Password {
                email: "a@b.com".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, SignInOutcome::SignedIn(session));
        assert!(provider.current_user().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sign_out_keeps_another_users_record() {
        let (_dir, provider) = provider();
        let alice = provider
            .sign_up(sign_up_form("Alice", "alice@a.com", "secret1"))
            .await
            .unwrap();
        let bob = provider
            .sign_up(sign_up_form("Bob", "bob@b.com", "secret2"))
            .await
            .unwrap();

        provider.sign_out(&alice).await.unwrap();
        let current = provider.current_user().unwrap().unwrap();
        assert_eq!(current.id, bob.user_id);
        assert_eq!(current.email, "bob@b.com");

        provider.sign_out(&bob).await.unwrap();
        assert!(provider.current_user().unwrap().is_none());
    }
}
