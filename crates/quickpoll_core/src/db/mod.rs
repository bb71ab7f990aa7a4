//! Database layer and transactional helpers for quickpoll.

/// Entity byte encoding.
pub mod codec;
/// Poll storage helpers.
pub mod poll;
/// redb table definitions.
pub mod tables;
/// Store handle and transaction helpers.
pub mod transactions;
/// User storage helpers.
pub mod user;

pub use transactions::KvStore;

use crate::constants::DEFAULT_PASSWORD_HASH_COST;
use crate::error::AppError;
use std::sync::Arc;

/// Tunables applied by the stores on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Reject polls created without any option.
    pub require_poll_options: bool,
    /// bcrypt cost factor for new password hashes.
    pub password_hash_cost: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            require_poll_options: false,
            password_hash_cost: DEFAULT_PASSWORD_HASH_COST,
        }
    }
}

/// Database handle bundling the store with its poll and user accessors.
pub struct Database {
    pub store: Arc<KvStore>,
    pub polls: poll::PollDb,
    pub users: user::UserDb,
    options: StoreOptions,
}

#[cfg(test)]
mod tests;

impl Database {
    /// Open the store with default options.
    ///
    /// # Returns
    /// A fully initialized [`Database`].
    ///
    /// # Errors
    /// Returns an error if the store file cannot be opened or initialized.
    pub fn new(path: &str) -> Result<Self, AppError> {
        Self::with_options(path, StoreOptions::default())
    }

    /// Open the store with explicit options.
    ///
    /// # Errors
    /// Returns an error if the store file cannot be opened or initialized.
    pub fn with_options(path: &str, options: StoreOptions) -> Result<Self, AppError> {
        let store = Arc::new(KvStore::open(path)?);
        Ok(Self::from_shared(store, options))
    }

    /// Build a database handle over an already-open store.
    ///
    /// This is used when multiple components in the same process need their
    /// own accessors without reopening the file (redb holds an exclusive
    /// file lock per open).
    pub fn from_shared(store: Arc<KvStore>, options: StoreOptions) -> Self {
        Self {
            polls: poll::PollDb::new(store.clone(), options.require_poll_options),
            users: user::UserDb::new(store.clone(), options.password_hash_cost),
            store,
            options,
        }
    }

    /// Clone this handle for another subsystem in the same process.
    pub fn share(&self) -> Self {
        Self::from_shared(self.store.clone(), self.options)
    }

    /// Options this handle was opened with.
    pub fn options(&self) -> StoreOptions {
        self.options
    }
}
