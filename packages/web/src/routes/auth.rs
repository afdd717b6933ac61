use api::auth::{OAuthCallback, SignUpForm};
use api::gate::GateWatch;
use api::{
    AppError, AuthContext, AuthMethod, CredentialProvider, Notice, PageOutcome, Route,
    SignInOutcome, SignInRequest,
};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::Deserialize;
use store::DataStore;
use tower_sessions::Session;
use tracing::warn;

use super::back_with_error;
use crate::error::WebError;
use crate::flash;
use crate::state::AppState;
use crate::views::AuthView;

#[derive(Debug, Deserialize)]
pub struct SignInForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// What the OAuth service appends to the callback URL.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set when the user declined consent.
    pub error: Option<String>,
}

/// Go wherever the auth event asked for, or home.
async fn follow(session: &Session, watch: &GateWatch) -> Result<Response, WebError> {
    match watch.take_navigation() {
        Some(navigation) => flash::redirect(session, navigation.to.path(), navigation.notice).await,
        None => flash::redirect(session, Route::Home.path(), None).await,
    }
}

/// `GET /auth`
pub async fn page<S: DataStore>(
    State(state): State<AppState<S>>,
    session: Session,
) -> Result<Response, WebError> {
    let ctx = AuthContext::new(session.clone());

    match state.gate.enter_auth(&ctx).await {
        PageOutcome::Show(notice) => {
            let method = state.provider.method();
            let mut notices = flash::take(&session).await?;
            notices.extend(notice);
            Ok(Json(AuthView {
                method,
                oauth_url: (method == AuthMethod::OAuth).then_some("/auth/oauth"),
                notices,
            })
            .into_response())
        }
        PageOutcome::Redirect(route, notice) => flash::redirect(&session, route.path(), notice).await,
        PageOutcome::Landing => flash::redirect(&session, Route::Home.path(), None).await,
    }
}

/// `POST /auth/sign-in`
pub async fn sign_in<S: DataStore>(
    State(state): State<AppState<S>>,
    session: Session,
    Form(form): Form<SignInForm>,
) -> Result<Response, WebError> {
    let ctx = AuthContext::new(session.clone());
    let watch = state.gate.watch(&ctx);
    let request = SignInRequest::Password {
        email: form.email,
        password: form.password,
    };

    match ctx.sign_in(&*state.provider, request).await {
        Ok(SignInOutcome::SignedIn(_)) => follow(&session, &watch).await,
        Ok(SignInOutcome::Redirect(url)) => Ok(Redirect::to(&url).into_response()),
        Err(e) => back_with_error(&session, Route::Auth, e).await,
    }
}

/// `POST /auth/sign-up`
pub async fn sign_up<S: DataStore>(
    State(state): State<AppState<S>>,
    session: Session,
    Form(form): Form<SignUpForm>,
) -> Result<Response, WebError> {
    let ctx = AuthContext::new(session.clone());
    let watch = state.gate.watch(&ctx);

    match ctx.sign_up(&*state.provider, form).await {
        Ok(_) => follow(&session, &watch).await,
        Err(e) => back_with_error(&session, Route::Auth, e).await,
    }
}

/// `GET /auth/oauth`: off to the provider's consent page.
pub async fn oauth<S: DataStore>(
    State(state): State<AppState<S>>,
    session: Session,
) -> Result<Response, WebError> {
    let ctx = AuthContext::new(session.clone());

    match ctx.sign_in(&*state.provider, SignInRequest::OAuth).await {
        Ok(SignInOutcome::Redirect(url)) => Ok(Redirect::to(&url).into_response()),
        Ok(SignInOutcome::SignedIn(_)) => flash::redirect(&session, Route::Home.path(), None).await,
        Err(e) => back_with_error(&session, Route::Auth, e).await,
    }
}

/// `GET /auth/callback`
pub async fn callback<S: DataStore>(
    State(state): State<AppState<S>>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Result<Response, WebError> {
    if let Some(error) = params.error {
        warn!("OAuth provider returned an error: {}", error);
        let e = AppError::validation("Sign-in was cancelled.");
        return back_with_error(&session, Route::Auth, e).await;
    }
    let (Some(code), Some(oauth_state)) = (params.code, params.state) else {
        return back_with_error(&session, Route::Auth, AppError::OAuthState).await;
    };

    let ctx = AuthContext::new(session.clone());
    let watch = state.gate.watch(&ctx);
    let callback = OAuthCallback {
        code,
        state: oauth_state,
    };

    match ctx.complete_oauth(&*state.provider, callback).await {
        Ok(_) => follow(&session, &watch).await,
        Err(e) => back_with_error(&session, Route::Auth, e).await,
    }
}

/// `POST /auth/sign-out`
pub async fn sign_out<S: DataStore>(
    State(state): State<AppState<S>>,
    session: Session,
) -> Result<Response, WebError> {
    let ctx = AuthContext::new(session.clone());

    match ctx.sign_out(&*state.provider).await {
        Ok(()) => {
            let notice = Notice::success("Signed out", "You have been signed out.");
            flash::redirect(&session, Route::Auth.path(), Some(notice)).await
        }
        Err(e) => back_with_error(&session, Route::Home, e).await,
    }
}
