//! # Session gate
//!
//! Decides, for every page, whether to show it or send the user somewhere
//! else:
//!
//! | Page | No session | Profile not completed | Profile completed |
//! |------|-----------|-----------------------|-------------------|
//! | `/` | landing view or `/auth` (per [`UnauthenticatedPolicy`]) | `/signup` | home with tasks |
//! | `/signup` | `/auth` | form | `/` |
//! | `/profile` | `/auth` | form | form |
//! | `/auth` | form | `/` | `/` |
//!
//! Session, profile and task reads happen one after another; if any of them
//! fails the user is sent to `/auth` with the generic error notice.
//!
//! [`SessionGate::watch`] additionally listens for auth events while a page is
//! open, so a sign-in completed on that page navigates home.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use store::{Profile, ProfileStore, TaskStore};
use tracing::{debug, error};

use crate::context::AuthContext;
use crate::error::AppResult;
use crate::events::{AuthEvent, Subscription};
use crate::notice::Notice;
use crate::profile::ProfileState;
use crate::session::{Session, SessionStore};
use crate::todos::TaskList;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Auth,
    Onboarding,
    Profile,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Auth => "/auth",
            Self::Onboarding => "/signup",
            Self::Profile => "/profile",
        }
    }
}

/// What `/` does for visitors without a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnauthenticatedPolicy {
    /// Render a landing view with a link to sign in.
    #[default]
    Landing,
    /// Redirect straight to `/auth`.
    Redirect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Anonymous,
    Onboarding(Session),
    Ready(Session, Profile),
}

/// Result of entering a page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome<T> {
    Show(T),
    Landing,
    Redirect(Route, Option<Notice>),
}

pub struct HomePage<S> {
    pub session: Session,
    pub profile: Profile,
    pub tasks: TaskList<S>,
}

/// `/signup` and `/profile` both show the session and whatever profile row
/// exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilePage {
    pub session: Session,
    pub profile: Option<Profile>,
}

/// A navigation requested by an auth event.
#[derive(Debug, Clone, PartialEq)]
pub struct Navigation {
    pub to: Route,
    pub notice: Option<Notice>,
}

/// Auth-event listener for the lifetime of one page. Dropping it unsubscribes.
pub struct GateWatch {
    pending: Arc<Mutex<Option<Navigation>>>,
    _subscription: Subscription,
}

impl GateWatch {
    /// The most recent navigation request, if any.
    pub fn take_navigation(&self) -> Option<Navigation> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

fn read_failed<T>(page: Route, e: &crate::error::AppError) -> PageOutcome<T> {
    error!("Failed to load {}: {}", page.path(), e);
    PageOutcome::Redirect(Route::Auth, Some(Notice::generic_error()))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionGate {
    policy: UnauthenticatedPolicy,
}

impl SessionGate {
    pub fn new(policy: UnauthenticatedPolicy) -> Self {
        Self { policy }
    }

    pub async fn resolve<T, S>(&self, ctx: &AuthContext<T>, profiles: &S) -> AppResult<GateDecision>
    where
        T: SessionStore + Sync,
        S: ProfileStore + Sync,
    {
        let Some(session) = ctx.current().await? else {
            return Ok(GateDecision::Anonymous);
        };

        match ProfileState::from_row(profiles.get_profile(session.user_id).await?) {
            ProfileState::Completed(profile) => Ok(GateDecision::Ready(session, profile)),
            ProfileState::Absent | ProfileState::Pending(_) => Ok(GateDecision::Onboarding(session)),
        }
    }

    /// `/`
    pub async fn enter_home<T, S>(&self, ctx: &AuthContext<T>, store: &S) -> PageOutcome<HomePage<S>>
    where
        T: SessionStore + Sync,
        S: ProfileStore + TaskStore + Clone + Sync,
    {
        let decision = match self.resolve(ctx, store).await {
            Ok(decision) => decision,
            Err(e) => return read_failed(Route::Home, &e),
        };

        match decision {
            GateDecision::Anonymous => match self.policy {
                UnauthenticatedPolicy::Landing => PageOutcome::Landing,
                UnauthenticatedPolicy::Redirect => PageOutcome::Redirect(Route::Auth, None),
            },
            GateDecision::Onboarding(session) => {
                debug!("Profile of {} not completed, sending to onboarding", session.user_id);
                PageOutcome::Redirect(Route::Onboarding, None)
            }
            GateDecision::Ready(session, profile) => {
                match TaskList::load(store.clone(), session.user_id).await {
                    Ok(tasks) => PageOutcome::Show(HomePage {
                        session,
                        profile,
                        tasks,
                    }),
                    Err(e) => read_failed(Route::Home, &e),
                }
            }
        }
    }

    /// `/signup`
    pub async fn enter_onboarding<T, S>(&self, ctx: &AuthContext<T>, profiles: &S) -> PageOutcome<ProfilePage>
    where
        T: SessionStore + Sync,
        S: ProfileStore + Sync,
    {
        let session = match ctx.current().await {
            Ok(Some(session)) => session,
            Ok(None) => return PageOutcome::Redirect(Route::Auth, None),
            Err(e) => return read_failed(Route::Onboarding, &e),
        };

        match profiles.get_profile(session.user_id).await {
            Ok(row) => match ProfileState::from_row(row) {
                ProfileState::Completed(_) => PageOutcome::Redirect(Route::Home, None),
                state => PageOutcome::Show(ProfilePage {
                    session,
                    profile: state.into_profile(),
                }),
            },
            Err(e) => read_failed(Route::Onboarding, &e.into()),
        }
    }

    /// `/profile`
    pub async fn enter_profile<T, S>(&self, ctx: &AuthContext<T>, profiles: &S) -> PageOutcome<ProfilePage>
    where
        T: SessionStore + Sync,
        S: ProfileStore + Sync,
    {
        let session = match ctx.current().await {
            Ok(Some(session)) => session,
            Ok(None) => return PageOutcome::Redirect(Route::Auth, None),
            Err(e) => return read_failed(Route::Profile, &e),
        };

        match profiles.get_profile(session.user_id).await {
            Ok(profile) => PageOutcome::Show(ProfilePage { session, profile }),
            Err(e) => read_failed(Route::Profile, &e.into()),
        }
    }

    /// `/auth`
    ///
    /// The form is shown even when the session cannot be read, together with
    /// the generic error notice.
    pub async fn enter_auth<T>(&self, ctx: &AuthContext<T>) -> PageOutcome<Option<Notice>>
    where
        T: SessionStore + Sync,
    {
        match ctx.current().await {
            Ok(Some(_)) => PageOutcome::Redirect(Route::Home, None),
            Ok(None) => PageOutcome::Show(None),
            Err(e) => {
                error!("Failed to read session on /auth: {}", e);
                PageOutcome::Show(Some(Notice::generic_error()))
            }
        }
    }

    /// Listen for auth changes for as long as the returned watch lives.
    pub fn watch<T>(&self, ctx: &AuthContext<T>) -> GateWatch
    where
        T: SessionStore + Sync,
    {
        let pending = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&pending);

        let subscription = ctx.subscribe(move |event| {
            let navigation = match event {
                AuthEvent::SignedIn(session) => Navigation {
                    to: Route::Home,
                    notice: Some(Notice::success(
                        "Signed in",
                        format!("Welcome, {}!", session.display_name()),
                    )),
                },
                AuthEvent::SignedOut => Navigation {
                    to: Route::Auth,
                    notice: None,
                },
            };
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(navigation);
        });

        GateWatch {
            pending,
            _subscription: subscription,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{PasswordProvider, SignUpForm};
    use crate::error::AppError;
    use crate::profile::{complete_onboarding, OnboardingForm};
    use crate::session::MemorySession;
    use chrono::Utc;
    use store::{Account, MemoryStore, StoreError, StoreResult, Task};
    use uuid::Uuid;

    /// Every read fails.
    #[derive(Clone)]
    struct DownStore;

    impl ProfileStore for DownStore {
        async fn get_profile(&self, _id: Uuid) -> StoreResult<Option<Profile>> {
            Err(StoreError::Backend("timeout".to_string()))
        }

        async fn upsert_profile(&self, _profile: Profile) -> StoreResult<Profile> {
            Err(StoreError::Backend("timeout".to_string()))
        }
    }

    impl TaskStore for DownStore {
        async fn list_tasks(&self, _user_id: Uuid) -> StoreResult<Vec<Task>> {
            Err(StoreError::Backend("timeout".to_string()))
        }

        async fn insert_task(&self, _user_id: Uuid, _title: &str) -> StoreResult<Task> {
            Err(StoreError::Backend("timeout".to_string()))
        }

        async fn set_task_completed(&self, _user_id: Uuid, _id: Uuid, _completed: bool) -> StoreResult<Task> {
            Err(StoreError::Backend("timeout".to_string()))
        }

        async fn delete_task(&self, _user_id: Uuid, _id: Uuid) -> StoreResult<()> {
            Err(StoreError::Backend("timeout".to_string()))
        }
    }

    fn signed_in_ctx() -> (Session, AuthContext<MemorySession>) {
        let session = Session::from_account(&Account::new("kakao", "1"));
        let ctx = AuthContext::new(MemorySession::signed_in(session.clone()));
        (session, ctx)
    }

    async fn complete_profile(store: &MemoryStore, session: &Session) {
        let profile = Profile {
            is_profile_completed: true,
            ..Profile::empty(session.user_id, Utc::now())
        };
        store.upsert_profile(profile).await.unwrap();
    }

    #[tokio::test]
    async fn test_anonymous_home_follows_policy() {
        let store = MemoryStore::new();
        let ctx = AuthContext::new(MemorySession::new());

        let landing = SessionGate::new(UnauthenticatedPolicy::Landing);
        assert!(matches!(landing.enter_home(&ctx, &store).await, PageOutcome::Landing));

        let redirect = SessionGate::new(UnauthenticatedPolicy::Redirect);
        assert!(matches!(
            redirect.enter_home(&ctx, &store).await,
            PageOutcome::Redirect(Route::Auth, None)
        ));
    }

    #[tokio::test]
    async fn test_incomplete_profile_goes_to_onboarding() {
        let store = MemoryStore::new();
        let (session, ctx) = signed_in_ctx();
        let gate = SessionGate::default();

        // No row at all
        assert!(matches!(
            gate.enter_home(&ctx, &store).await,
            PageOutcome::Redirect(Route::Onboarding, None)
        ));

        store
            .upsert_profile(Profile::empty(session.user_id, Utc::now()))
            .await
            .unwrap();
        assert!(matches!(
            gate.enter_home(&ctx, &store).await,
            PageOutcome::Redirect(Route::Onboarding, None)
        ));
        assert!(matches!(
            gate.enter_onboarding(&ctx, &store).await,
            PageOutcome::Show(_)
        ));
    }

    #[tokio::test]
    async fn test_completed_profile_sees_home_and_skips_onboarding() {
        let store = MemoryStore::new();
        let (session, ctx) = signed_in_ctx();
        complete_profile(&store, &session).await;
        store.insert_task(session.user_id, "Buy milk").await.unwrap();

        let gate = SessionGate::default();
        let PageOutcome::Show(page) = gate.enter_home(&ctx, &store).await else {
            panic!("expected the home page");
        };
        assert_eq!(page.session, session);
        assert_eq!(page.tasks.tasks().len(), 1);

        assert_eq!(
            gate.enter_onboarding(&ctx, &store).await,
            PageOutcome::Redirect(Route::Home, None)
        );
        assert!(matches!(gate.enter_profile(&ctx, &store).await, PageOutcome::Show(_)));
        assert_eq!(gate.enter_auth(&ctx).await, PageOutcome::Redirect(Route::Home, None));
    }

    #[tokio::test]
    async fn test_signed_out_pages_redirect_to_auth() {
        let store = MemoryStore::new();
        let ctx = AuthContext::new(MemorySession::new());
        let gate = SessionGate::default();

        assert_eq!(
            gate.enter_onboarding(&ctx, &store).await,
            PageOutcome::Redirect(Route::Auth, None)
        );
        assert_eq!(
            gate.enter_profile(&ctx, &store).await,
            PageOutcome::Redirect(Route::Auth, None)
        );
        assert_eq!(gate.enter_auth(&ctx).await, PageOutcome::Show(None));
    }

    /// A session backend that cannot be read.
    struct BrokenSession;

    impl SessionStore for BrokenSession {
        async fn load_session(&self) -> AppResult<Option<Session>> {
            Err(AppError::Session("connection reset".to_string()))
        }

        async fn store_session(&self, _session: &Session) -> AppResult<()> {
            Err(AppError::Session("connection reset".to_string()))
        }

        async fn clear_session(&self) -> AppResult<()> {
            Err(AppError::Session("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn test_auth_page_shows_generic_notice_when_session_unreadable() {
        let ctx = AuthContext::new(BrokenSession);
        let gate = SessionGate::default();

        assert_eq!(
            gate.enter_auth(&ctx).await,
            PageOutcome::Show(Some(Notice::generic_error()))
        );
    }

    #[tokio::test]
    async fn test_read_failure_redirects_with_generic_notice() {
        let (_session, ctx) = signed_in_ctx();
        let gate = SessionGate::default();

        let outcome = gate.enter_home(&ctx, &DownStore).await;
        assert!(matches!(
            outcome,
            PageOutcome::Redirect(Route::Auth, Some(ref notice)) if *notice == Notice::generic_error()
        ));
        assert_eq!(
            gate.enter_profile(&ctx, &DownStore).await,
            PageOutcome::Redirect(Route::Auth, Some(Notice::generic_error()))
        );
    }

    #[tokio::test]
    async fn test_watch_navigates_home_on_sign_in() {
        let provider = PasswordProvider::new(MemoryStore::new());
        let ctx = AuthContext::new(MemorySession::new());
        let gate = SessionGate::default();

        let watch = gate.watch(&ctx);
        assert!(watch.take_navigation().is_none());

        ctx.sign_up(
            &provider,
            SignUpForm {
                name: "홍길동".to_string(),
                email: "a@b.com".to_string(),
                password: "secret1".to_string(),
                confirm_password: "secret1".to_string(),
            },
        )
        .await
        .unwrap();

        let navigation = watch.take_navigation().unwrap();
        assert_eq!(navigation.to, Route::Home);
        assert!(navigation.notice.is_some_and(|n| !n.is_error()));
        assert!(watch.take_navigation().is_none());

        assert_eq!(ctx.events().listener_count(), 1);
        drop(watch);
        assert_eq!(ctx.events().listener_count(), 0);
    }

    #[tokio::test]
    async fn test_sign_up_onboarding_and_first_task() {
        let store = MemoryStore::new();
        let provider = PasswordProvider::new(store.clone());
        let ctx = AuthContext::new(MemorySession::new());
        let gate = SessionGate::default();

        let session = ctx
            .sign_up(
                &provider,
                SignUpForm {
                    name: "홍길동".to_string(),
                    email: "a@b.com".to_string(),
                    password: "secret1".to_string(),
                    confirm_password: "secret1".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            gate.enter_home(&ctx, &store).await,
            PageOutcome::Redirect(Route::Onboarding, None)
        ));

        complete_onboarding(
            &store,
            &session,
            &OnboardingForm {
                name: "홍길동".to_string(),
                phone_number: "010-1234-5678".to_string(),
            },
        )
        .await
        .unwrap();

        let PageOutcome::Show(mut page) = gate.enter_home(&ctx, &store).await else {
            panic!("expected the home page");
        };
        assert!(page.tasks.tasks().is_empty());

        page.tasks.add("Buy milk").await.unwrap();
        let PageOutcome::Show(page) = gate.enter_home(&ctx, &store).await else {
            panic!("expected the home page");
        };
        let task = &page.tasks.tasks()[0];
        assert_eq!(task.title, "Buy milk");
        assert!(!task.completed);
        assert_eq!(task.user_id, session.user_id);
    }
}
