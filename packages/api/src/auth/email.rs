//! Email + password sign-in against the configured store.

use store::{Account, AccountStore, ProfileStore, StoreError, PROVIDER_EMAIL};
use tracing::info;

use super::password::{hash_password, verify_password};
use super::{normalize_email, AuthMethod, CredentialProvider, SignInOutcome, SignInRequest, SignUpForm};
use crate::error::{AppError, AppResult};
use crate::profile::begin_onboarding;
use crate::session::Session;

/// Shortest password accepted at sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

pub struct PasswordProvider<S> {
    store: S,
}

impl<S> PasswordProvider<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

/// Checks shared by sign-in and sign-up. Returns the normalised email.
fn require_credentials(email: &str, password: &str) -> AppResult<String> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::validation("Please enter your email."));
    }
    if password.is_empty() {
        return Err(AppError::validation("Please enter your password."));
    }
    Ok(email)
}

fn validate_sign_up(form: &SignUpForm) -> AppResult<String> {
    let email = require_credentials(&form.email, &form.password)?;
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters."
        )));
    }
    if form.password != form.confirm_password {
        return Err(AppError::validation("Passwords do not match."));
    }
    Ok(email)
}

impl<S> CredentialProvider for PasswordProvider<S>
where
    S: AccountStore + ProfileStore + Send + Sync,
{
    fn method(&self) -> AuthMethod {
        AuthMethod::Password
    }

    async fn sign_in(&self, request: SignInRequest) -> AppResult<SignInOutcome> {
        let SignInRequest::Password { email, password } = request else {
            return Err(AppError::Unsupported("OAuth sign-in", self.method()));
        };
        let email = require_credentials(&email, &password)?;

        let account = self
            .store
            .find_account(PROVIDER_EMAIL, &email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let Some(hash) = account.password_hash.as_deref() else {
            return Err(AppError::InvalidCredentials);
        };
        if !verify_password(&password, hash)? {
            return Err(AppError::InvalidCredentials);
        }

        info!("User signed in: {}", account.id);
        Ok(SignInOutcome::SignedIn(Session::from_account(&account)))
    }

    async fn sign_up(&self, form: SignUpForm) -> AppResult<Session> {
        let email = validate_sign_up(&form)?;

        if self
            .store
            .find_account(PROVIDER_EMAIL, &email)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateAccount);
        }

        let name = form.name.trim();
        let mut account = Account::new(PROVIDER_EMAIL, email.clone());
        account.email = Some(email);
        account.name = (!name.is_empty()).then(|| name.to_string());
        account.password_hash = Some(hash_password(&form.password)?);

        let account = match self.store.insert_account(account).await {
            Ok(account) => account,
            Err(StoreError::Conflict(_)) => return Err(AppError::DuplicateAccount),
            Err(e) => return Err(e.into()),
        };
        begin_onboarding(&self.store, &account).await?;

        info!("Created account {}", account.id);
        Ok(Session::from_account(&account))
    }
}
