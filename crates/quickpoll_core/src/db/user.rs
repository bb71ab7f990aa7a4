//! User storage operations backed by redb.

use super::codec;
use super::tables::USERS;
use super::transactions::{load, KvStore};
use crate::error::AppError;
use crate::models::user::{Credentials, User};
use redb::ReadableTable;
use std::sync::Arc;

/// Accessor for the `users` table.
pub struct UserDb {
    store: Arc<KvStore>,
    hash_cost: u32,
}

fn user_exists(name: &str) -> AppError {
    AppError::Conflict(format!("User '{}' already exists", name))
}

impl UserDb {
    /// Bind a user accessor to an open store.
    ///
    /// # Arguments
    /// - `store`: Shared store handle.
    /// - `hash_cost`: bcrypt cost factor for new password hashes.
    pub fn new(store: Arc<KvStore>, hash_cost: u32) -> Self {
        Self { store, hash_cost }
    }

    /// Create an account, hashing the plaintext password.
    ///
    /// A read-only pre-check rejects known names before paying for the hash;
    /// the authoritative existence check and the insert then run in one write
    /// transaction, so concurrent signups for one name store a single record.
    ///
    /// # Returns
    /// The stored [`User`].
    ///
    /// # Errors
    /// Returns [`AppError::Validation`] for empty fields,
    /// [`AppError::Conflict`] when the name is taken, [`AppError::Internal`]
    /// when hashing fails, or a storage/codec error.
    pub fn create(&self, credentials: &Credentials) -> Result<User, AppError> {
        credentials.validate()?;
        let name = credentials.name.as_str();
        if self.get(name)?.is_some() {
            return Err(user_exists(name));
        }

        let password_hash = bcrypt::hash(&credentials.password, self.hash_cost)
            .map_err(|err| AppError::Internal(format!("Password hashing failed: {}", err)))?;
        let user = User {
            name: name.to_string(),
            password_hash,
        };
        let encoded = codec::encode(&user)?;

        self.store.update(|txn| {
            let mut users = txn.open_table(USERS)?;
            if users.get(name)?.is_some() {
                return Err(user_exists(name));
            }
            users.insert(name, encoded.as_slice())?;
            Ok(())
        })?;

        tracing::info!(user = %name, "user created");
        Ok(user)
    }

    /// Fetch a user by name.
    ///
    /// # Returns
    /// `Ok(Some(user))` when found, `Ok(None)` when missing.
    ///
    /// # Errors
    /// Returns an error when storage access or decoding fails.
    pub fn get(&self, name: &str) -> Result<Option<User>, AppError> {
        self.store.view(|txn| {
            let users = txn.open_table(USERS)?;
            load(&users, name)
        })
    }

    /// Check a plaintext password against the stored hash.
    ///
    /// # Returns
    /// The matching [`User`].
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] for unknown users,
    /// [`AppError::Unauthorized`] on password mismatch, and
    /// [`AppError::Internal`] when the stored hash cannot be parsed.
    pub fn verify(&self, name: &str, password: &str) -> Result<User, AppError> {
        let user = self
            .get(name)?
            .ok_or_else(|| AppError::NotFound(format!("No such user '{}'", name)))?;

        match bcrypt::verify(password, &user.password_hash) {
            Ok(true) => Ok(user),
            Ok(false) => {
                tracing::debug!(user = %name, "password mismatch");
                Err(AppError::Unauthorized("Invalid credentials".to_string()))
            }
            Err(err) => Err(AppError::Internal(format!(
                "Stored password hash for '{}' is unusable: {}",
                name, err
            ))),
        }
    }
}
