//! Shared constants used across quickpoll crates.

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default store file name under the data directory.
pub const DEFAULT_DB_FILE_NAME: &str = "polls.redb";

/// Default body limit for poll mutations.
pub const DEFAULT_MAX_BODY_SIZE: usize = 4096;

/// Body limit for signup and login requests.
pub const AUTH_BODY_LIMIT: usize = 1024;

/// bcrypt cost for new password hashes.
pub const DEFAULT_PASSWORD_HASH_COST: u32 = 13;

/// Lowest and highest cost bcrypt accepts.
pub const MIN_PASSWORD_HASH_COST: u32 = 4;
pub const MAX_PASSWORD_HASH_COST: u32 = 31;

/// Requests still running after this many seconds are answered with 504.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// bcrypt hashes only this many password bytes; longer passwords are refused.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Token lifetime from issuance.
pub const TOKEN_LIFETIME_HOURS: i64 = 24;

/// Default directory and base name for the token signing key.
pub const DEFAULT_KEY_PATH: &str = "./.keys";
pub const DEFAULT_KEY_NAME: &str = "quickpoll";
