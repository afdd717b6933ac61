use api::gate::GateDecision;
use api::{AppResult, AuthContext, Notice, Route, TaskList};
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use store::DataStore;
use tower_sessions::Session;
use tracing::error;
use uuid::Uuid;

use crate::flash;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NewTask {
    #[serde(default)]
    pub title: String,
}

/// The caller's loaded task list, or the redirect the gate asks for.
async fn open_list<S: DataStore>(
    state: &AppState<S>,
    session: &Session,
) -> Result<TaskList<S>, Response> {
    let ctx = AuthContext::new(session.clone());

    let (route, notice) = match state.gate.resolve(&ctx, &state.store).await {
        Ok(GateDecision::Ready(user, _)) => {
            match TaskList::load(state.store.clone(), user.user_id).await {
                Ok(list) => return Ok(list),
                Err(e) => (Route::Auth, Some(e.notice())),
            }
        }
        Ok(GateDecision::Onboarding(_)) => (Route::Onboarding, None),
        Ok(GateDecision::Anonymous) => (Route::Auth, None),
        Err(e) => {
            error!("Failed to resolve session: {}", e);
            (Route::Auth, Some(e.notice()))
        }
    };

    Err(flash::redirect(session, route.path(), notice)
        .await
        .into_response())
}

async fn finish(session: &Session, result: AppResult<Notice>) -> Response {
    let notice = result.unwrap_or_else(|e| e.notice());
    flash::redirect(session, Route::Home.path(), Some(notice))
        .await
        .into_response()
}

/// `POST /todos`
pub async fn add<S: DataStore>(
    State(state): State<AppState<S>>,
    session: Session,
    Form(form): Form<NewTask>,
) -> Response {
    let mut list = match open_list(&state, &session).await {
        Ok(list) => list,
        Err(redirect) => return redirect,
    };
    let result = list.add(&form.title).await;
    finish(&session, result).await
}

/// `POST /todos/{id}/toggle`
pub async fn toggle<S: DataStore>(
    State(state): State<AppState<S>>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Response {
    let mut list = match open_list(&state, &session).await {
        Ok(list) => list,
        Err(redirect) => return redirect,
    };
    let result = list.toggle(id).await;
    finish(&session, result).await
}

/// `POST /todos/{id}/delete`
pub async fn delete<S: DataStore>(
    State(state): State<AppState<S>>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Response {
    let mut list = match open_list(&state, &session).await {
        Ok(list) => list,
        Err(redirect) => return redirect,
    };
    let result = list.delete(id).await;
    finish(&session, result).await
}
