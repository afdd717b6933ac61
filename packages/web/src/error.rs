use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Failures a handler cannot turn into a redirect with a notice.
#[derive(Error, Debug)]
pub enum WebError {
    #[error(transparent)]
    App(#[from] api::AppError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            api::Notice::generic_error().description,
        )
            .into_response()
    }
}
