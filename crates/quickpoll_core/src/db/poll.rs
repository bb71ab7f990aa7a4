//! Poll storage operations backed by redb.

use super::codec;
use super::tables::POLLS;
use super::transactions::{load, KvStore};
use crate::error::AppError;
use crate::models::poll::Poll;
use redb::ReadableTable;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Accessor for the `polls` table.
pub struct PollDb {
    store: Arc<KvStore>,
    require_options: bool,
}

fn poll_not_found(name: &str) -> AppError {
    AppError::NotFound(format!("No such poll '{}'", name))
}

impl PollDb {
    /// Bind a poll accessor to an open store.
    ///
    /// # Arguments
    /// - `store`: Shared store handle.
    /// - `require_options`: Reject polls created without options.
    pub fn new(store: Arc<KvStore>, require_options: bool) -> Self {
        Self {
            store,
            require_options,
        }
    }

    /// Validate and insert a new poll.
    ///
    /// # Returns
    /// `Ok(())` when the insert commits.
    ///
    /// # Errors
    /// Returns [`AppError::Validation`] for malformed polls,
    /// [`AppError::Conflict`] when a poll with the same name exists, or a
    /// storage/codec error.
    pub fn create(&self, poll: &Poll) -> Result<(), AppError> {
        poll.validate(self.require_options)?;
        let encoded = codec::encode(poll)?;

        self.store.update(|txn| {
            let mut polls = txn.open_table(POLLS)?;
            if polls.get(poll.name.as_str())?.is_some() {
                return Err(AppError::Conflict(format!(
                    "Poll '{}' already exists",
                    poll.name
                )));
            }
            polls.insert(poll.name.as_str(), encoded.as_slice())?;
            Ok(())
        })?;

        tracing::debug!("Created poll '{}'", poll.name);
        Ok(())
    }

    /// Fetch a poll by name.
    ///
    /// # Returns
    /// `Ok(Some(poll))` when found, `Ok(None)` when missing.
    ///
    /// # Errors
    /// Returns an error when storage access or decoding fails.
    pub fn get(&self, name: &str) -> Result<Option<Poll>, AppError> {
        self.store.view(|txn| {
            let polls = txn.open_table(POLLS)?;
            load(&polls, name)
        })
    }

    /// Fetch every poll keyed by name.
    ///
    /// Iteration follows storage order; callers must not rely on it.
    ///
    /// # Errors
    /// Returns an error when storage access or decoding of any row fails.
    pub fn list(&self) -> Result<BTreeMap<String, Poll>, AppError> {
        self.store.view(|txn| {
            let polls = txn.open_table(POLLS)?;
            let mut out = BTreeMap::new();
            for entry in polls.iter()? {
                let (key, value) = entry?;
                let poll: Poll = codec::decode(value.value())?;
                out.insert(key.value().to_string(), poll);
            }
            Ok(out)
        })
    }

    /// Append an option to a poll unless the response already exists.
    ///
    /// The lookup and the append share one write transaction, so concurrent
    /// calls for the same new response append it once.
    ///
    /// # Returns
    /// `Ok(true)` when the option was appended, `Ok(false)` when it was
    /// already present (nothing is written).
    ///
    /// # Errors
    /// Returns [`AppError::Validation`] for an empty response,
    /// [`AppError::NotFound`] when the poll is missing, or a storage/codec
    /// error.
    pub fn add_option(&self, poll_name: &str, response: &str) -> Result<bool, AppError> {
        if response.is_empty() {
            return Err(AppError::Validation("Response is required".to_string()));
        }

        self.store.update(|txn| {
            let mut polls = txn.open_table(POLLS)?;
            let mut poll: Poll =
                load(&polls, poll_name)?.ok_or_else(|| poll_not_found(poll_name))?;
            if !poll.add_option(response) {
                return Ok(false);
            }
            let encoded = codec::encode(&poll)?;
            polls.insert(poll_name, encoded.as_slice())?;
            Ok(true)
        })
    }

    /// Record `user`'s vote for `response`, removing the user from every other
    /// option of the poll in the same write.
    ///
    /// # Returns
    /// The poll as committed.
    ///
    /// # Errors
    /// Returns [`AppError::Validation`] for empty inputs,
    /// [`AppError::NotFound`] when the poll or the option is missing, or a
    /// storage/codec error. Nothing is written on error.
    pub fn vote(&self, poll_name: &str, response: &str, user: &str) -> Result<Poll, AppError> {
        if response.is_empty() {
            return Err(AppError::Validation("Response is required".to_string()));
        }
        if user.is_empty() {
            return Err(AppError::Validation("Voter name is required".to_string()));
        }

        self.store.update(|txn| {
            let mut polls = txn.open_table(POLLS)?;
            let mut poll: Poll =
                load(&polls, poll_name)?.ok_or_else(|| poll_not_found(poll_name))?;
            poll.record_vote(response, user)?;
            let encoded = codec::encode(&poll)?;
            polls.insert(poll_name, encoded.as_slice())?;
            Ok(poll)
        })
    }
}
