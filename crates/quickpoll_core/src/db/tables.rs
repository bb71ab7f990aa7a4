//! redb table definitions shared by storage modules.

use redb::TableDefinition;

/// Account rows (`User`, bincode-encoded), keyed by user name.
pub const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
/// Poll rows (`Poll`, bincode-encoded), keyed by poll name.
pub const POLLS: TableDefinition<&str, &[u8]> = TableDefinition::new("polls");
