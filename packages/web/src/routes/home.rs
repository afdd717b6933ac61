use api::{AuthContext, PageOutcome, Route};
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use store::DataStore;
use tower_sessions::Session;

use crate::error::WebError;
use crate::flash;
use crate::state::AppState;
use crate::views::{HomeView, LandingView, UserView};

/// `GET /`
pub async fn home<S: DataStore>(
    State(state): State<AppState<S>>,
    session: Session,
) -> Result<Response, WebError> {
    let ctx = AuthContext::new(session.clone());

    match state.gate.enter_home(&ctx, &state.store).await {
        PageOutcome::Show(page) => Ok(Json(HomeView {
            user: UserView::from(&page.session),
            profile: page.profile,
            tasks: page.tasks.into_tasks(),
            notices: flash::take(&session).await?,
        })
        .into_response()),
        PageOutcome::Landing => Ok(Json(LandingView {
            sign_in: Route::Auth.path(),
            notices: flash::take(&session).await?,
        })
        .into_response()),
        PageOutcome::Redirect(route, notice) => flash::redirect(&session, route.path(), notice).await,
    }
}
