//! Poll-related data models and validation.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A poll as stored under its name in the `polls` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub name: String,
    pub question: String,
    pub options: Vec<PollOption>,
}

/// One possible answer to a poll, with the names of users who picked it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub response: String,
    pub votes: BTreeSet<String>,
}

/// Per-option vote count, in option order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionTally {
    pub response: String,
    pub votes: usize,
}

/// Vote counts for a whole poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollResults {
    pub name: String,
    pub question: String,
    pub total: usize,
    pub options: Vec<OptionTally>,
}

/// Request payload for creating a poll.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePollRequest {
    pub name: String,
    pub question: String,
    #[serde(default)]
    pub options: Vec<OptionRequest>,
}

/// Request payload naming a single option (add-option and vote).
#[derive(Debug, Clone, Deserialize)]
pub struct OptionRequest {
    pub response: String,
}

/// Poll names are storage keys and URL segments: ASCII letters and digits only.
pub fn is_valid_poll_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

impl PollOption {
    /// Create an option with no votes.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            votes: BTreeSet::new(),
        }
    }
}

impl Poll {
    /// Create a poll with the given responses and no votes.
    ///
    /// # Arguments
    /// - `name`: Poll name (storage key).
    /// - `question`: Question text.
    /// - `responses`: Initial option responses, in display order.
    ///
    /// # Returns
    /// A new, unvalidated [`Poll`].
    pub fn new<I, S>(name: impl Into<String>, question: impl Into<String>, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            question: question.into(),
            options: responses.into_iter().map(PollOption::new).collect(),
        }
    }

    /// Check the poll's shape before it is persisted.
    ///
    /// # Arguments
    /// - `require_options`: Reject polls without any option.
    ///
    /// # Errors
    /// Returns [`AppError::Validation`] describing the first problem found.
    pub fn validate(&self, require_options: bool) -> Result<(), AppError> {
        if self.name.is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        if !is_valid_poll_name(&self.name) {
            return Err(AppError::Validation(
                "Poll names must be alphanumeric".to_string(),
            ));
        }
        if self.question.is_empty() {
            return Err(AppError::Validation("Question is required".to_string()));
        }
        if require_options && self.options.is_empty() {
            return Err(AppError::Validation(
                "At least one option is required".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for option in &self.options {
            if option.response.is_empty() {
                return Err(AppError::Validation("Response is required".to_string()));
            }
            if !seen.insert(option.response.as_str()) {
                return Err(AppError::Validation(format!(
                    "Duplicate response '{}'",
                    option.response
                )));
            }
        }
        Ok(())
    }

    /// Find an option by its response text.
    pub fn option(&self, response: &str) -> Option<&PollOption> {
        self.options.iter().find(|option| option.response == response)
    }

    /// Response the user currently votes for, if any.
    pub fn vote_of(&self, user: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|option| option.votes.contains(user))
            .map(|option| option.response.as_str())
    }

    /// Append an option unless one with the same response exists.
    ///
    /// # Returns
    /// `true` when an option was appended.
    pub fn add_option(&mut self, response: &str) -> bool {
        if self.option(response).is_some() {
            return false;
        }
        self.options.push(PollOption::new(response));
        true
    }

    /// Record `user`'s vote for `response`, withdrawing any other vote the
    /// user holds in this poll.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when no option has that response; the
    /// poll is left untouched in that case.
    pub fn record_vote(&mut self, response: &str, user: &str) -> Result<(), AppError> {
        if self.option(response).is_none() {
            return Err(AppError::NotFound(format!(
                "No option '{}' in poll '{}'",
                response, self.name
            )));
        }
        for option in &mut self.options {
            if option.response == response {
                option.votes.insert(user.to_string());
            } else {
                option.votes.remove(user);
            }
        }
        Ok(())
    }

    /// Count votes per option.
    pub fn tally(&self) -> PollResults {
        let options: Vec<OptionTally> = self
            .options
            .iter()
            .map(|option| OptionTally {
                response: option.response.clone(),
                votes: option.votes.len(),
            })
            .collect();
        PollResults {
            name: self.name.clone(),
            question: self.question.clone(),
            total: options.iter().map(|tally| tally.votes).sum(),
            options,
        }
    }
}

impl From<CreatePollRequest> for Poll {
    fn from(value: CreatePollRequest) -> Self {
        Poll::new(
            value.name,
            value.question,
            value.options.into_iter().map(|option| option.response),
        )
    }
}
