//! Error type for the proof service

use ballot_cli::MerkleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("merkle error: {0}")]
    Merkle(#[from] MerkleError),

    #[error("invalid database path {0}")]
    InvalidDbPath(String),

    #[error("corrupt whitelist entry: {0}")]
    CorruptEntry(String),

    #[error("ballot id {0} does not fit the store")]
    BallotIdOutOfRange(u64),

    #[error("no identities supplied")]
    EmptyBatch,

    /// The store already holds entries for a ballot ID the ledger just issued.
    #[error("ballot id {0} already has persisted whitelist entries")]
    BallotIdReused(u64),

    /// The ledger has not confirmed the latest root yet.
    #[error("root for ballot {0} is not yet on the ledger")]
    RootPushPending(u64),

    #[error("ballot {0} has no root push on record")]
    NoSyncState(u64),

    #[error("nothing to retry for ballot {0}")]
    NothingToRetry(u64),
}

impl ServiceError {
    /// Whether the caller can expect the same request to succeed later
    /// without any change on its side.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::RootPushPending(_) => true,
            ServiceError::Database(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ServiceError::RootPushPending(1).is_retryable());
        assert!(ServiceError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!ServiceError::Database(sqlx::Error::RowNotFound).is_retryable());
        assert!(!ServiceError::EmptyBatch.is_retryable());
        assert!(!ServiceError::NothingToRetry(0).is_retryable());
    }
}
