pub mod constants;
pub mod migrator;
pub mod models;
pub mod operations;
pub mod path;
pub mod sql;

use anyhow::Result;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::info;

pub use migrator::run_migrations;
pub use models::WhitelistEntryRecord;

use constants::MEMORY_DB_PATH;

/// Persisted whitelist store for the proof service
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database and run migrations
    pub async fn connect(db_path: &str) -> Result<Self> {
        info!("Initializing database at {:?}", db_path);

        let options = path::connect_options(db_path)?;

        // Every in-memory connection is its own database, so keep exactly one.
        let max_connections = if db_path == MEMORY_DB_PATH { 1 } else { 8 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(if db_path == MEMORY_DB_PATH { 1 } else { 0 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        run_migrations(&pool).await?;

        info!("Database initialized successfully");

        Ok(Database { pool })
    }

    /// Fresh in-memory database, used by tests and ephemeral runs
    pub async fn in_memory() -> Result<Self> {
        Self::connect(MEMORY_DB_PATH).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_registry::Identity;

    fn identity(byte: u8) -> Identity {
        Identity::new([byte; 32])
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::in_memory().await.unwrap();
        run_migrations(db.pool()).await.unwrap();

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(applied, 1);
        assert_eq!(
            migrator::get_current_version(db.pool()).await.unwrap(),
            constants::CURRENT_SCHEMA_VERSION
        );
    }

    #[tokio::test]
    async fn test_insert_is_append_only_and_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let pool = db.pool();

        let added = WhitelistEntryRecord::insert_batch(pool, 0, &[identity(1), identity(2)])
            .await
            .unwrap();
        assert_eq!(added, 2);

        let added = WhitelistEntryRecord::insert_batch(pool, 0, &[identity(2), identity(3)])
            .await
            .unwrap();
        assert_eq!(added, 1);

        assert_eq!(WhitelistEntryRecord::count_for_ballot(pool, 0).await.unwrap(), 3);
        assert_eq!(WhitelistEntryRecord::count_for_ballot(pool, 1).await.unwrap(), 0);

        let entries = WhitelistEntryRecord::list_for_ballot(pool, 0).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.ballot_id == 0));
    }

    #[tokio::test]
    async fn test_load_all_groups_by_ballot() {
        let db = Database::in_memory().await.unwrap();
        let pool = db.pool();
        WhitelistEntryRecord::insert_batch(pool, 0, &[identity(1)])
            .await
            .unwrap();
        WhitelistEntryRecord::insert_batch(pool, 4, &[identity(1), identity(2)])
            .await
            .unwrap();

        let grouped = WhitelistEntryRecord::load_all(pool).await.unwrap();
        assert_eq!(grouped.keys().copied().collect::<Vec<_>>(), vec![0, 4]);
        assert_eq!(grouped[&4].len(), 2);
    }

    #[tokio::test]
    async fn test_max_ballot_id() {
        let db = Database::in_memory().await.unwrap();
        let pool = db.pool();
        assert_eq!(WhitelistEntryRecord::max_ballot_id(pool).await.unwrap(), None);

        WhitelistEntryRecord::insert_batch(pool, 3, &[identity(1)])
            .await
            .unwrap();
        WhitelistEntryRecord::insert_batch(pool, 1, &[identity(2)])
            .await
            .unwrap();
        assert_eq!(WhitelistEntryRecord::max_ballot_id(pool).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_ballot_id_out_of_range() {
        let db = Database::in_memory().await.unwrap();
        let err = WhitelistEntryRecord::insert_batch(db.pool(), u64::MAX, &[identity(1)])
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::ServiceError::BallotIdOutOfRange(_)));
    }
}
