use ballot_registry::Identity;
use serde::{Deserialize, Serialize};

/// Whitelist entry record in the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntryRecord {
    pub ballot_id: u64,
    pub identity: Identity,
    pub added_at: String, // ISO8601 UTC timestamp
}
