use serde::Serialize;

use crate::{Digest, Identity};

/// Append-only log entries emitted by successful registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "PascalCase")]
pub enum RegistryEvent {
    BallotCreated {
        ballot_id: u64,
        proposal_names: Vec<String>,
    },
    VoteCast {
        ballot_id: u64,
        identity: Identity,
        proposal_index: usize,
    },
    BallotClosed {
        ballot_id: u64,
    },
    MerkleRootUpdated {
        ballot_id: u64,
        merkle_root: Digest,
    },
}
