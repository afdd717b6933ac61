use api::profile::{self as profiles, OnboardingForm, ProfileForm};
use api::{AuthContext, PageOutcome, Route};
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Form, Json,
};
use store::DataStore;
use tower_sessions::Session;

use super::back_with_error;
use crate::error::WebError;
use crate::flash;
use crate::state::AppState;
use crate::views::{ProfileView, UserView};

async fn render(
    session: &Session,
    outcome: PageOutcome<api::gate::ProfilePage>,
) -> Result<Response, WebError> {
    match outcome {
        PageOutcome::Show(page) => Ok(Json(ProfileView {
            user: UserView::from(&page.session),
            profile: page.profile,
            notices: flash::take(session).await?,
        })
        .into_response()),
        PageOutcome::Redirect(route, notice) => flash::redirect(session, route.path(), notice).await,
        PageOutcome::Landing => flash::redirect(session, Route::Home.path(), None).await,
    }
}

/// `GET /signup`
pub async fn onboarding<S: DataStore>(
    State(state): State<AppState<S>>,
    session: Session,
) -> Result<Response, WebError> {
    let ctx = AuthContext::new(session.clone());
    let outcome = state.gate.enter_onboarding(&ctx, &state.store).await;
    render(&session, outcome).await
}

/// `POST /signup`
pub async fn complete_onboarding<S: DataStore>(
    State(state): State<AppState<S>>,
    session: Session,
    Form(form): Form<OnboardingForm>,
) -> Result<Response, WebError> {
    let ctx = AuthContext::new(session.clone());
    let Some(user) = ctx.current().await? else {
        return flash::redirect(&session, Route::Auth.path(), None).await;
    };

    match profiles::complete_onboarding(&state.store, &user, &form).await {
        Ok((_, notice)) => flash::redirect(&session, Route::Home.path(), Some(notice)).await,
        Err(e) => back_with_error(&session, Route::Onboarding, e).await,
    }
}

/// `GET /profile`
pub async fn page<S: DataStore>(
    State(state): State<AppState<S>>,
    session: Session,
) -> Result<Response, WebError> {
    let ctx = AuthContext::new(session.clone());
    let outcome = state.gate.enter_profile(&ctx, &state.store).await;
    render(&session, outcome).await
}

/// `POST /profile`
pub async fn save<S: DataStore>(
    State(state): State<AppState<S>>,
    session: Session,
    Form(form): Form<ProfileForm>,
) -> Result<Response, WebError> {
    let ctx = AuthContext::new(session.clone());
    let Some(user) = ctx.current().await? else {
        return flash::redirect(&session, Route::Auth.path(), None).await;
    };

    match profiles::save_profile(&state.store, &user, &form).await {
        Ok((_, notice)) => flash::redirect(&session, Route::Profile.path(), Some(notice)).await,
        Err(e) => back_with_error(&session, Route::Profile, e).await,
    }
}
