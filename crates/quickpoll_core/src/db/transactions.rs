//! Single-file store handle with read-only views and serialized updates.

use super::codec;
use super::tables::{POLLS, USERS};
use crate::error::AppError;
use redb::{ReadTransaction, ReadableDatabase, ReadableTable, WriteTransaction};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Open redb file with the `users` and `polls` tables guaranteed to exist.
///
/// redb allows any number of concurrent read transactions alongside at most
/// one write transaction; [`KvStore::update`] inherits that discipline.
pub struct KvStore {
    db: redb::Database,
}

impl KvStore {
    /// Open (or create) the store file and its tables.
    ///
    /// # Arguments
    /// - `path`: Store file path. Missing parent directories are created.
    ///
    /// # Returns
    /// A ready [`KvStore`].
    ///
    /// # Errors
    /// Returns [`AppError::StoreUnavailable`] when the file is held by another
    /// process, unreadable, or not a valid store, and
    /// [`AppError::StoreMessage`] when the parent directory cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                AppError::StoreMessage(format!(
                    "Failed to create store directory '{}': {}",
                    parent.display(),
                    err
                ))
            })?;
        }

        let db = redb::Database::create(path)?;
        let write_txn = db.begin_write()?;
        write_txn.open_table(USERS)?;
        write_txn.open_table(POLLS)?;
        write_txn.commit()?;

        tracing::debug!("Opened store at {}", path.display());
        Ok(Self { db })
    }

    /// Run `f` against a read-only snapshot.
    ///
    /// # Errors
    /// Returns transaction-start failures or whatever `f` returns.
    pub fn view<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&ReadTransaction) -> Result<T, AppError>,
    {
        let read_txn = self.db.begin_read()?;
        f(&read_txn)
    }

    /// Run `f` inside a write transaction.
    ///
    /// Commits when `f` returns `Ok`. When `f` returns `Err` every write it
    /// made is discarded and the error is returned unchanged. Never retries.
    ///
    /// # Errors
    /// Returns transaction-start or commit failures, or the error from `f`.
    pub fn update<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&WriteTransaction) -> Result<T, AppError>,
    {
        let write_txn = self.db.begin_write()?;
        match f(&write_txn) {
            Ok(value) => {
                write_txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = write_txn.abort() {
                    tracing::warn!("Failed to abort write transaction: {}", abort_err);
                }
                Err(err)
            }
        }
    }
}

/// Load and decode the value stored under `key`.
///
/// # Errors
/// Returns storage or decode failures.
pub(crate) fn load<T, Tbl>(table: &Tbl, key: &str) -> Result<Option<T>, AppError>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<&'static str, &'static [u8]>,
{
    let Some(guard) = table.get(key)? else {
        return Ok(None);
    };
    Ok(Some(codec::decode(guard.value())?))
}
