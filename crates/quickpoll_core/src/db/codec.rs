//! Byte encoding for stored entities.
//!
//! Every value in the `users` and `polls` tables is the bincode encoding of
//! the corresponding model. Both directions are pure.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Failure to move an entity across the byte boundary.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(#[source] bincode::Error),

    #[error("decode failed: {0}")]
    Decode(#[source] bincode::Error),
}

/// Serialize an entity into its stored representation.
///
/// # Errors
/// Returns [`CodecError::Encode`] when serialization fails.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(value).map_err(CodecError::Encode)
}

/// Deserialize an entity from its stored representation.
///
/// # Errors
/// Returns [`CodecError::Decode`] for truncated or type-mismatched payloads.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(CodecError::Decode)
}
