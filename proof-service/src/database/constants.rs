//! Database migration constants and metadata

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Migration descriptions
pub const MIGRATION_DESCRIPTIONS: &[&str] = &["Initial whitelist entries schema"];

/// Default database file name
pub const DEFAULT_DB_PATH: &str = "whitelist.db";

/// Path value selecting a private in-memory database
pub const MEMORY_DB_PATH: &str = ":memory:";
