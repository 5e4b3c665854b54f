use std::collections::BTreeSet;

use serde::Serialize;

use crate::{error::ErrorCode, Digest, Identity, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ballot {
    /// ID, equal to the ballot's index in the registry.
    pub ballot_id: u64,
    /// Signer that created the ballot.
    pub creator: Identity,
    /// Root of the whitelist merkle tree votes are verified against.
    pub merkle_root: Digest,
    /// Proposal names, fixed at creation.
    pub proposals: Vec<String>,
    /// Vote count per proposal index.
    pub tally: Vec<u64>,
    /// Identities that have voted.
    pub voted: BTreeSet<Identity>,
    /// Cleared once the ballot is closed; never set again.
    pub active: bool,
}

impl Ballot {
    pub fn new(ballot_id: u64, creator: Identity, merkle_root: Digest, proposals: Vec<String>) -> Self {
        let tally = vec![0; proposals.len()];
        Self {
            ballot_id,
            creator,
            merkle_root,
            proposals,
            tally,
            voted: BTreeSet::new(),
            active: true,
        }
    }

    pub fn has_voted(&self, identity: &Identity) -> bool {
        self.voted.contains(identity)
    }

    pub fn vote_count(&self, proposal_index: usize) -> Result<u64> {
        self.tally
            .get(proposal_index)
            .copied()
            .ok_or(ErrorCode::InvalidProposal)
    }

    pub fn total_votes(&self) -> u64 {
        self.voted.len() as u64
    }
}
