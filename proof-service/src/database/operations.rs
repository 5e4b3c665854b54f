use std::collections::BTreeMap;

use ballot_registry::Identity;
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use super::models::WhitelistEntryRecord;
use super::sql::{
    COUNT_BALLOT_ENTRIES_SQL, INSERT_WHITELIST_ENTRY_SQL, MAX_BALLOT_ID_SQL,
    SELECT_ALL_ENTRIES_SQL, SELECT_BALLOT_ENTRIES_SQL,
};
use crate::error::ServiceError;

type EntryRow = (i64, String, String);

fn ballot_key(ballot_id: u64) -> Result<i64, ServiceError> {
    i64::try_from(ballot_id).map_err(|_| ServiceError::BallotIdOutOfRange(ballot_id))
}

/// Database operations for whitelist entries
impl WhitelistEntryRecord {
    /// Append identities to a ballot's whitelist in one transaction. Returns how
    /// many were new; identities already present are left untouched.
    pub async fn insert_batch(
        pool: &SqlitePool,
        ballot_id: u64,
        identities: &[Identity],
    ) -> Result<u64, ServiceError> {
        let key = ballot_key(ballot_id)?;
        let added_at = chrono::Utc::now().to_rfc3339();

        let mut tx = pool.begin().await?;
        let mut inserted = 0;
        for identity in identities {
            inserted += sqlx::query(INSERT_WHITELIST_ENTRY_SQL)
                .bind(key)
                .bind(identity.to_string())
                .bind(&added_at)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        debug!(
            "Inserted {} of {} whitelist entries for ballot {}",
            inserted,
            identities.len(),
            ballot_id
        );
        Ok(inserted)
    }

    /// Get all entries for one ballot, oldest first
    pub async fn list_for_ballot(
        pool: &SqlitePool,
        ballot_id: u64,
    ) -> Result<Vec<WhitelistEntryRecord>, ServiceError> {
        let rows: Vec<EntryRow> = sqlx::query_as(SELECT_BALLOT_ENTRIES_SQL)
            .bind(ballot_key(ballot_id)?)
            .fetch_all(pool)
            .await?;

        rows.into_iter().map(Self::from_row).collect()
    }

    /// Get every entry, grouped by ballot ID
    pub async fn load_all(
        pool: &SqlitePool,
    ) -> Result<BTreeMap<u64, Vec<Identity>>, ServiceError> {
        let rows: Vec<EntryRow> = sqlx::query_as(SELECT_ALL_ENTRIES_SQL)
            .fetch_all(pool)
            .await?;

        let mut grouped: BTreeMap<u64, Vec<Identity>> = BTreeMap::new();
        for row in rows {
            let record = Self::from_row(row)?;
            grouped
                .entry(record.ballot_id)
                .or_default()
                .push(record.identity);
        }
        Ok(grouped)
    }

    pub async fn count_for_ballot(pool: &SqlitePool, ballot_id: u64) -> Result<u64, ServiceError> {
        let count: i64 = sqlx::query_scalar(COUNT_BALLOT_ENTRIES_SQL)
            .bind(ballot_key(ballot_id)?)
            .fetch_one(pool)
            .await?;
        Ok(count as u64)
    }

    /// Highest ballot ID with at least one entry, if any.
    pub async fn max_ballot_id(pool: &SqlitePool) -> Result<Option<u64>, ServiceError> {
        let max: Option<i64> = sqlx::query_scalar(MAX_BALLOT_ID_SQL)
            .fetch_one(pool)
            .await?;
        max.map(|id| {
            u64::try_from(id)
                .map_err(|_| ServiceError::CorruptEntry(format!("negative ballot id {}", id)))
        })
        .transpose()
    }

    fn from_row((ballot_id, identity, added_at): EntryRow) -> Result<Self, ServiceError> {
        let identity = identity
            .parse::<Identity>()
            .map_err(|e| ServiceError::CorruptEntry(format!("{}: {}", identity, e)))?;
        let ballot_id = u64::try_from(ballot_id)
            .map_err(|_| ServiceError::CorruptEntry(format!("negative ballot id {}", ballot_id)))?;

        Ok(WhitelistEntryRecord {
            ballot_id,
            identity,
            added_at,
        })
    }
}
