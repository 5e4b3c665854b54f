//! Types for HTTP requests and responses

use ballot_registry::{encode_digest, Ballot, Digest, Identity};
use serde::{Deserialize, Serialize, Serializer};

use crate::service::ProofLookupResult;
use crate::sync::{SyncState, SyncStatus};

pub fn serialize_digest<S: Serializer>(digest: &Digest, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&encode_digest(digest))
}

pub fn serialize_digests<S: Serializer>(
    digests: &[Digest],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(digests.iter().map(encode_digest))
}

/// Parse base58 identities, reporting the first bad entry.
pub fn parse_identities(raw: &[String]) -> Result<Vec<Identity>, String> {
    raw.iter()
        .map(|s| s.parse::<Identity>().map_err(|e| format!("{}: {}", s, e)))
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct CreateBallotRequest {
    pub proposals: Vec<String>,
    #[serde(default)]
    pub identities: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateBallotResponse {
    pub ballot_id: u64,
    #[serde(serialize_with = "serialize_digest")]
    pub merkle_root: Digest,
    pub addresses: usize,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Deserialize)]
pub struct WhitelistRequest {
    pub identities: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct WhitelistResponse {
    pub ballot_id: u64,
    #[serde(serialize_with = "serialize_digest")]
    pub merkle_root: Digest,
    pub addresses: usize,
    pub added: u64,
    pub sync_status: SyncStatus,
    pub sync: SyncState,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub ballot_id: u64,
    pub addresses: usize,
}

#[derive(Debug, Serialize)]
pub struct ProofResponse {
    pub ballot_id: u64,
    pub identity: Identity,
    #[serde(serialize_with = "serialize_digests")]
    pub proof: Vec<Digest>,
    #[serde(serialize_with = "serialize_digest")]
    pub merkle_root: Digest,
    pub is_whitelisted: bool,
    pub sync_status: SyncStatus,
}

impl From<ProofLookupResult> for ProofResponse {
    fn from(result: ProofLookupResult) -> Self {
        Self {
            ballot_id: result.ballot_id,
            identity: result.identity,
            proof: result.proof,
            merkle_root: result.merkle_root,
            is_whitelisted: result.is_whitelisted,
            sync_status: result.sync_status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProposalTally {
    pub name: String,
    pub votes: u64,
}

#[derive(Debug, Serialize)]
pub struct BallotResponse {
    pub ballot_id: u64,
    pub creator: Identity,
    /// Root currently stored on the ledger.
    #[serde(serialize_with = "serialize_digest")]
    pub merkle_root: Digest,
    pub proposals: Vec<ProposalTally>,
    pub total_votes: u64,
    pub active: bool,
    pub addresses: usize,
    pub sync: Option<SyncState>,
}

impl BallotResponse {
    pub fn new(ballot: &Ballot, addresses: usize, sync: Option<SyncState>) -> Self {
        Self {
            ballot_id: ballot.ballot_id,
            creator: ballot.creator,
            merkle_root: ballot.merkle_root,
            proposals: ballot
                .proposals
                .iter()
                .zip(&ballot.tally)
                .map(|(name, votes)| ProposalTally {
                    name: name.clone(),
                    votes: *votes,
                })
                .collect(),
            total_votes: ballot.total_votes(),
            active: ballot.active,
            addresses,
            sync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identities_reports_bad_entry() {
        let good = Identity::new([4; 32]).to_string();
        let parsed = parse_identities(&[good.clone()]).unwrap();
        assert_eq!(parsed, vec![Identity::new([4; 32])]);

        let err = parse_identities(&[good, "not-base58!".to_string()]).unwrap_err();
        assert!(err.starts_with("not-base58!"));
    }

    #[test]
    fn test_proof_response_encodes_digests_as_base58() {
        let response = ProofResponse {
            ballot_id: 2,
            identity: Identity::new([1; 32]),
            proof: vec![[2; 32]],
            merkle_root: [3; 32],
            is_whitelisted: true,
            sync_status: SyncStatus::Confirmed,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["proof"][0], encode_digest(&[2; 32]));
        assert_eq!(value["merkle_root"], encode_digest(&[3; 32]));
        assert_eq!(value["sync_status"], "confirmed");
        assert_eq!(value["identity"], Identity::new([1; 32]).to_string());
    }
}
