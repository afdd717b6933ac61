//! JSON bodies returned by the page routes.

use api::{AuthMethod, Notice, Session};
use serde::Serialize;
use store::{Profile, Task};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub provider: String,
}

impl From<&Session> for UserView {
    fn from(session: &Session) -> Self {
        Self {
            id: session.user_id,
            display_name: session.display_name().to_string(),
            email: session.email.clone(),
            avatar_url: session.avatar_url.clone(),
            provider: session.provider.clone(),
        }
    }
}

/// `/` for visitors without a session.
#[derive(Debug, Serialize)]
pub struct LandingView {
    pub sign_in: &'static str,
    pub notices: Vec<Notice>,
}

/// `/` once onboarding is done.
#[derive(Debug, Serialize)]
pub struct HomeView {
    pub user: UserView,
    pub profile: Profile,
    pub tasks: Vec<Task>,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Serialize)]
pub struct AuthView {
    pub method: AuthMethod,
    /// Set when sign-in goes through an OAuth service.
    pub oauth_url: Option<&'static str>,
    pub notices: Vec<Notice>,
}

/// `/signup` and `/profile`.
#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub user: UserView,
    pub profile: Option<Profile>,
    pub notices: Vec<Notice>,
}
