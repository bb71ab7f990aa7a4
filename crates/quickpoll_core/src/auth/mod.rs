//! Stateless authentication: signed tokens and their signing key.

/// Signing key persistence and rotation.
pub mod keys;
/// Token issuance and verification.
pub mod token;

pub use keys::{key_file_path, load_or_create_key, rotate_key};
pub use token::{Claims, TokenError, TokenService};
