//! Notices carried across a redirect in the session, shown once.

use api::Notice;
use axum::response::{IntoResponse, Redirect, Response};
use tower_sessions::Session;

use crate::error::WebError;

const FLASH_KEY: &str = "flash";

pub async fn push(session: &Session, notice: Notice) -> Result<(), WebError> {
    let mut notices: Vec<Notice> = session.get(FLASH_KEY).await?.unwrap_or_default();
    notices.push(notice);
    session.insert(FLASH_KEY, notices).await?;
    Ok(())
}

/// Remove and return pending notices.
pub async fn take(session: &Session) -> Result<Vec<Notice>, WebError> {
    Ok(session
        .remove::<Vec<Notice>>(FLASH_KEY)
        .await?
        .unwrap_or_default())
}

/// 303 to `to`, leaving `notice` for the next page.
pub async fn redirect(
    session: &Session,
    to: &str,
    notice: Option<Notice>,
) -> Result<Response, WebError> {
    if let Some(notice) = notice {
        push(session, notice).await?;
    }
    Ok(Redirect::to(to).into_response())
}
