//! Shared test-only helpers for quickpoll_core.

use crate::db::StoreOptions;
use crate::Database;
use tempfile::TempDir;

/// Cheapest cost bcrypt accepts; keeps signup-heavy tests fast.
pub(crate) const TEST_HASH_COST: u32 = 4;

/// Creates an isolated temporary database and returns it with the temp dir.
///
/// Keep the [`TempDir`] alive for the full test to preserve the backing file.
///
/// # Panics
/// Panics if temp-dir creation, path conversion, or database initialization
/// fails in the test environment.
pub(crate) fn setup_temp_db() -> (Database, TempDir) {
    setup_temp_db_with(StoreOptions {
        require_poll_options: false,
        password_hash_cost: TEST_HASH_COST,
    })
}

/// Same as [`setup_temp_db`] with explicit store options.
pub(crate) fn setup_temp_db_with(options: StoreOptions) -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("test.redb");
    let db = Database::with_options(db_path.to_str().expect("db path"), options).expect("db");
    (db, temp_dir)
}
