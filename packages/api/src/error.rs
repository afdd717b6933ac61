//! # Error taxonomy
//!
//! [`AppError`] separates three kinds of failure:
//!
//! - **validation** (`Validation`): bad input, caught before any store call;
//! - **credentials** (`InvalidCredentials`, `DuplicateAccount`): the backend
//!   answered, and the answer is "no";
//! - **remote** (everything else): a store, session, or OAuth call failed.
//!
//! Missing sessions and unfinished profiles are not errors at all; the
//! [`crate::gate`] turns them into redirects. Nothing here is retried.
//! [`AppError::notice`] produces the message to show; remote failures all
//! collapse into [`Notice::generic_error`] and are logged instead.

use store::StoreError;
use thiserror::Error;

use crate::auth::AuthMethod;
use crate::notice::Notice;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    DuplicateAccount,

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("{0} is not available with {1} sign-in")]
    Unsupported(&'static str, AuthMethod),

    #[error("Invalid or expired OAuth state")]
    OAuthState,

    #[error("OAuth provider error: {0}")]
    OAuth(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Failed to hash password: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Errors the user caused and can fix by changing the input.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidCredentials | Self::DuplicateAccount
        )
    }

    pub fn notice(&self) -> Notice {
        if self.is_user_error() {
            Notice::error(self.to_string())
        } else {
            Notice::generic_error()
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors_keep_their_message() {
        let notice = AppError::validation("Please enter a title").notice();
        assert!(notice.is_error());
        assert_eq!(notice.description, "Please enter a title");

        assert_eq!(
            AppError::InvalidCredentials.notice().description,
            "Invalid email or password"
        );
    }

    #[test]
    fn test_remote_errors_are_generic() {
        let notice = AppError::Store(StoreError::Backend("connection reset".into())).notice();
        assert_eq!(notice, Notice::generic_error());
        assert!(!notice.description.contains("connection reset"));
    }
}
