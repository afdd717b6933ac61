//! # API crate: sign-in, onboarding and to-do logic
//!
//! Everything the web server does per request, independent of HTTP. Handlers in
//! the `web` crate build an [`AuthContext`] around the request's session, ask
//! the [`SessionGate`] what to show, and call into the providers, the profile
//! operations and the [`TaskList`].
//!
//! ## Modules
//!
//! | Module | Feature gate | Purpose |
//! |--------|-------------|---------|
//! | [`auth`] | - | `CredentialProvider` with local, email/password and OAuth (Kakao, GitHub, Google) implementations; Argon2 password hashing |
//! | [`context`] | - | Request-scoped `AuthContext`: current session, sign-in/up/out, auth events |
//! | [`db`] | `server` | PostgreSQL pool, migrations and the `PgStore` backend |
//! | [`error`] | - | `AppError` and how each kind is shown to the user |
//! | [`events`] | - | Auth-state callback registry with drop-to-unsubscribe handles |
//! | [`gate`] | - | Session gate: which page to show or where to redirect |
//! | [`notice`] | - | Toast-style user notifications |
//! | [`profile`] | - | Profile lifecycle (absent, pending, completed) and its forms |
//! | [`session`] | - | `Session` and the `SessionStore` trait (in-memory and tower-sessions) |
//! | [`todos`] | - | Task list view-model |

pub mod auth;
pub mod context;
#[cfg(feature = "server")]
pub mod db;
pub mod error;
pub mod events;
pub mod gate;
pub mod notice;
pub mod profile;
pub mod session;
pub mod todos;

pub use auth::{AuthMethod, CredentialProvider, Provider, SignInOutcome, SignInRequest};
pub use context::AuthContext;
pub use error::{AppError, AppResult};
pub use gate::{PageOutcome, Route, SessionGate, UnauthenticatedPolicy};
pub use notice::Notice;
pub use session::{Session, SessionStore};
pub use todos::TaskList;
