use std::path::{Component, Path};
use std::{fs, str::FromStr};

use sqlx::sqlite::SqliteConnectOptions;

use super::constants::MEMORY_DB_PATH;
use crate::error::ServiceError;

fn invalid(db_path: &str, reason: &str) -> ServiceError {
    ServiceError::InvalidDbPath(format!("{:?}: {}", db_path, reason))
}

/// Sqlite connect options for `DB_PATH`. `:memory:` selects a private
/// in-memory database; anything else must name a regular file reached without
/// `..` components or symlinks. The file is created when missing.
pub fn connect_options(db_path: &str) -> Result<SqliteConnectOptions, ServiceError> {
    if db_path == MEMORY_DB_PATH {
        return Ok(SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true));
    }

    if db_path.is_empty() {
        return Err(invalid(db_path, "empty path"));
    }
    if db_path.chars().any(char::is_control) {
        return Err(invalid(db_path, "control characters"));
    }

    let path = Path::new(db_path);
    if path.components().any(|c| c == Component::ParentDir) {
        return Err(invalid(db_path, "parent directory traversal"));
    }
    if path.file_name().is_none() {
        return Err(invalid(db_path, "no file name"));
    }
    if let Ok(meta) = fs::symlink_metadata(path) {
        if meta.file_type().is_symlink() {
            return Err(invalid(db_path, "symlink"));
        }
        if meta.is_dir() {
            return Err(invalid(db_path, "directory"));
        }
    }

    Ok(SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true))
}
