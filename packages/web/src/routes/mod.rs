//! HTTP handlers. Pages answer with JSON views; every form post ends in a
//! 303 redirect, with the outcome left as a flash notice.

pub mod auth;
pub mod home;
pub mod profile;
pub mod todos;

use api::{AppError, Route};
use axum::response::Response;
use tower_sessions::Session;
use tracing::{debug, error};

use crate::error::WebError;
use crate::flash;

pub use home::home;

/// Send the user back to `to` with the notice for `e`.
async fn back_with_error(session: &Session, to: Route, e: AppError) -> Result<Response, WebError> {
    if e.is_user_error() {
        debug!("Rejected input: {}", e);
    } else {
        error!("Request failed: {}", e);
    }
    flash::redirect(session, to.path(), Some(e.notice())).await
}
