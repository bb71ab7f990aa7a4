//! Configuration loading from environment variables.

use crate::constants::{
    DEFAULT_DB_FILE_NAME, DEFAULT_KEY_NAME, DEFAULT_KEY_PATH, DEFAULT_MAX_BODY_SIZE,
    DEFAULT_PASSWORD_HASH_COST, DEFAULT_PORT, MAX_PASSWORD_HASH_COST, MIN_PASSWORD_HASH_COST,
};
use crate::db::StoreOptions;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Runtime configuration for quickpoll.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub db_path: String,
    pub port: u16,
    pub max_body_size: usize,
    pub key_path: String,
    pub key_name: String,
    pub signup_secret: Option<String>,
    pub require_poll_options: bool,
    pub password_hash_cost: u32,
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: String) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = resolve_home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path
}

fn resolve_home_dir() -> Option<PathBuf> {
    if let Ok(home) = env::var("HOME") {
        if !home.trim().is_empty() {
            return Some(PathBuf::from(home));
        }
    }

    // Windows
    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.trim().is_empty() {
            return Some(PathBuf::from(profile));
        }
    }

    std::env::current_dir().ok()
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Returns
/// `Some(bool)` when the value is recognized, otherwise `None`.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean flag from the environment.
///
/// Missing or unrecognized values are treated as `false`.
pub fn env_flag_enabled(name: &str) -> bool {
    env::var(name)
        .ok()
        .and_then(|value| parse_env_flag(&value))
        .unwrap_or(false)
}

/// Parse a bcrypt cost, keeping it inside the range bcrypt accepts.
pub fn parse_hash_cost(value: &str) -> Option<u32> {
    value
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|cost| (MIN_PASSWORD_HASH_COST..=MAX_PASSWORD_HASH_COST).contains(cost))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing.
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("DB_PATH").map(expand_tilde).unwrap_or_else(|_| {
                let home = resolve_home_dir().unwrap_or_else(|| PathBuf::from("."));
                home.join(".cache")
                    .join("quickpoll")
                    .join(DEFAULT_DB_FILE_NAME)
                    .to_string_lossy()
                    .to_string()
            }),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            max_body_size: env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_BODY_SIZE),
            key_path: env::var("KEY_PATH")
                .map(expand_tilde)
                .unwrap_or_else(|_| DEFAULT_KEY_PATH.to_string()),
            key_name: non_empty_var("KEY_NAME").unwrap_or_else(|| DEFAULT_KEY_NAME.to_string()),
            signup_secret: non_empty_var("SIGNUP_SECRET"),
            require_poll_options: env_flag_enabled("REQUIRE_POLL_OPTIONS"),
            password_hash_cost: env::var("BCRYPT_COST")
                .ok()
                .and_then(|value| parse_hash_cost(&value))
                .unwrap_or(DEFAULT_PASSWORD_HASH_COST),
        }
    }

    /// Store tunables derived from this configuration.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            require_poll_options: self.require_poll_options,
            password_hash_cost: self.password_hash_cost,
        }
    }
}
