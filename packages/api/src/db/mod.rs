//! # Database module: PostgreSQL backend
//!
//! Only compiled with the `server` feature, so builds without a database never
//! pull in SQLx.
//!
//! - [`connect`] opens a pool of up to 5 connections; the caller owns it and
//!   passes it on explicitly.
//! - [`migrate`] runs the embedded migrations in `packages/api/migrations`.
//! - [`PgStore`] implements every `store` repository trait on top of the pool.
//!   Row timestamps come from the database clock.

mod pg_store;
mod pool;

pub use pg_store::PgStore;
pub use pool::{connect, migrate};
