//! SQL statement constants for database operations

pub const CREATE_MIGRATIONS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL,
    description TEXT NOT NULL
)
"#;

pub const CREATE_WHITELIST_ENTRIES_TABLE_SQL: &str = r#"
CREATE TABLE whitelist_entries (
    ballot_id INTEGER NOT NULL,
    identity TEXT NOT NULL, -- base58
    added_at TEXT NOT NULL,
    PRIMARY KEY (ballot_id, identity)
)
"#;

pub const CREATE_DB_INDEXES: &[&str] = &[
    "CREATE INDEX idx_whitelist_added_at ON whitelist_entries(ballot_id, added_at)",
];

// Duplicate (ballot_id, identity) pairs are ignored; entries are never updated or deleted.
pub const INSERT_WHITELIST_ENTRY_SQL: &str =
    "INSERT OR IGNORE INTO whitelist_entries (ballot_id, identity, added_at) VALUES (?, ?, ?)";

pub const SELECT_BALLOT_ENTRIES_SQL: &str = "SELECT ballot_id, identity, added_at \
     FROM whitelist_entries WHERE ballot_id = ? ORDER BY added_at, identity";

pub const SELECT_ALL_ENTRIES_SQL: &str = "SELECT ballot_id, identity, added_at \
     FROM whitelist_entries ORDER BY ballot_id, added_at, identity";

pub const COUNT_BALLOT_ENTRIES_SQL: &str =
    "SELECT COUNT(*) FROM whitelist_entries WHERE ballot_id = ?";

pub const MAX_BALLOT_ID_SQL: &str = "SELECT MAX(ballot_id) FROM whitelist_entries";
