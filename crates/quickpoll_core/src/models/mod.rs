//! Data models for API requests and persistence.

/// Polls, options and tallies.
pub mod poll;
/// User accounts and credentials.
pub mod user;

#[cfg(test)]
mod tests;
