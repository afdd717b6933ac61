//! The request-scoped auth context.
//!
//! An [`AuthContext`] pairs the caller's [`SessionStore`] with an
//! [`AuthEvents`] registry. It is built once per request (or per page in an
//! embedded client) and dropped with it, so listeners never outlive the
//! request that registered them.

use tracing::{error, info};

use crate::auth::{CredentialProvider, OAuthCallback, SignInOutcome, SignInRequest, SignUpForm};
use crate::error::AppResult;
use crate::events::{AuthEvent, AuthEvents, Subscription};
use crate::session::{Session, SessionStore};

pub struct AuthContext<T> {
    session: T,
    events: AuthEvents,
}

impl<T: SessionStore + Sync> AuthContext<T> {
    pub fn new(session: T) -> Self {
        Self {
            session,
            events: AuthEvents::new(),
        }
    }

    /// The signed-in user, if any.
    pub async fn current(&self) -> AppResult<Option<Session>> {
        self.session.load_session().await
    }

    async fn establish(&self, session: Session) -> AppResult<Session> {
        self.session.store_session(&session).await?;
        self.events.emit(&AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    pub async fn sign_in<P: CredentialProvider + Sync>(
        &self,
        provider: &P,
        request: SignInRequest,
    ) -> AppResult<SignInOutcome> {
        match provider.sign_in(request).await? {
            SignInOutcome::SignedIn(session) => {
                Ok(SignInOutcome::SignedIn(self.establish(session).await?))
            }
            redirect @ SignInOutcome::Redirect(_) => Ok(redirect),
        }
    }

    pub async fn sign_up<P: CredentialProvider + Sync>(
        &self,
        provider: &P,
        form: SignUpForm,
    ) -> AppResult<Session> {
        let session = provider.sign_up(form).await?;
        self.establish(session).await
    }

    pub async fn complete_oauth<P: CredentialProvider + Sync>(
        &self,
        provider: &P,
        callback: OAuthCallback,
    ) -> AppResult<Session> {
        let session = provider.complete(callback).await?;
        self.establish(session).await
    }

    /// Clear the session. Signing out while signed out is a no-op.
    pub async fn sign_out<P: CredentialProvider + Sync>(&self, provider: &P) -> AppResult<()> {
        let Some(session) = self.current().await? else {
            return Ok(());
        };

        self.session.clear_session().await?;
        if let Err(e) = provider.sign_out(&session).await {
            error!("Sign-out hook failed for {}: {}", session.user_id, e);
        }

        info!("User signed out: {}", session.user_id);
        self.events.emit(&AuthEvent::SignedOut);
        Ok(())
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn events(&self) -> &AuthEvents {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PasswordProvider;
    use crate::session::MemorySession;
    use std::sync::{Arc, Mutex};
    use store::MemoryStore;

    fn form() -> SignUpForm {
        SignUpForm {
            name: "홍길동".to_string(),
            email: "a@b.com".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sign_up_saves_session_and_notifies() {
        let provider = PasswordProvider::new(MemoryStore::new());
        let ctx = AuthContext::new(MemorySession::new());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = ctx.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        let session = ctx.sign_up(&provider, form()).await.unwrap();
        assert_eq!(ctx.current().await.unwrap(), Some(session.clone()));

        ctx.sign_out(&provider).await.unwrap();
        assert!(ctx.current().await.unwrap().is_none());

        assert_eq!(
            *seen.lock().unwrap(),
            vec![AuthEvent::SignedIn(session), AuthEvent::SignedOut]
        );
    }

    #[tokio::test]
    async fn test_failed_sign_in_leaves_session_empty() {
        let provider = PasswordProvider::new(MemoryStore::new());
        let ctx = AuthContext::new(MemorySession::new());

        let result = ctx
            .sign_in(
                &provider,
                SignInRequest::Password {
                    email: "a@b.com".to_string(),
                    password: "secret1".to_string(),
                },
            )
            .await;
        assert!(result.is_err());
        assert!(ctx.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_without_session_emits_nothing() {
        let provider = PasswordProvider::new(MemoryStore::new());
        let ctx = AuthContext::new(MemorySession::new());
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let _subscription = ctx.subscribe(move |_| *counter.lock().unwrap() += 1);

        ctx.sign_out(&provider).await.unwrap();
        assert_eq!(*count.lock().unwrap(), 0);
    }
}
