//! User account models.

use crate::constants::MAX_PASSWORD_BYTES;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A user account as stored under its name in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub password_hash: String,
}

/// Name and plaintext password supplied at signup or login.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub name: String,
    #[serde(alias = "pass")]
    pub password: String,
}

impl Credentials {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
        }
    }

    /// # Errors
    /// Returns [`AppError::Validation`] when the name or password is empty, or
    /// the password is longer than bcrypt can hash.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(AppError::Validation("Password is required".to_string()));
        }
        if self.password.len() > MAX_PASSWORD_BYTES {
            return Err(AppError::Validation(format!(
                "Password must be at most {} bytes",
                MAX_PASSWORD_BYTES
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .finish()
    }
}
