//! Core domain library for quickpoll (config, storage, auth, models).

/// Password and token authentication.
pub mod auth;
/// Configuration loading and defaults.
pub mod config;
/// Shared constants.
pub mod constants;
/// Database access layer and transactions.
pub mod db;
/// Environment mutation helpers shared by tests.
pub mod env;
/// Application error types (storage/domain).
pub mod error;
/// Data models for API requests and persistence.
pub mod models;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::token::{TokenError, TokenService};
pub use config::Config;
pub use constants::*;
pub use db::{Database, StoreOptions};
pub use error::{AppError, ErrorKind};
