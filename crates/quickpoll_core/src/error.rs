//! Application error types for core storage and domain logic.
use crate::auth::token::TokenError;
use crate::db::codec::CodecError;
use thiserror::Error;

/// Coarse failure classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Unauthorized,
    StoreUnavailable,
    Internal,
}

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] redb::Error),

    #[error("Store unavailable: {0}")]
    StoreMessage(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Unauthorized(_) => ErrorKind::Unauthorized,
            AppError::StoreUnavailable(_) | AppError::StoreMessage(_) => {
                ErrorKind::StoreUnavailable
            }
            AppError::Codec(_) | AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the immediate caller can act on this error (fix input, pick
    /// another name, log in again).
    ///
    /// # Returns
    /// `false` for infrastructure and internal failures.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::StoreUnavailable | ErrorKind::Internal
        )
    }
}

impl From<TokenError> for AppError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Signing(message) => Self::Internal(message),
            other => Self::Unauthorized(other.to_string()),
        }
    }
}

impl From<redb::DatabaseError> for AppError {
    fn from(value: redb::DatabaseError) -> Self {
        Self::StoreUnavailable(value.into())
    }
}

impl From<redb::TransactionError> for AppError {
    fn from(value: redb::TransactionError) -> Self {
        Self::StoreUnavailable(value.into())
    }
}

impl From<redb::TableError> for AppError {
    fn from(value: redb::TableError) -> Self {
        Self::StoreUnavailable(value.into())
    }
}

impl From<redb::StorageError> for AppError {
    fn from(value: redb::StorageError) -> Self {
        Self::StoreUnavailable(value.into())
    }
}

impl From<redb::CommitError> for AppError {
    fn from(value: redb::CommitError) -> Self {
        Self::StoreUnavailable(value.into())
    }
}
