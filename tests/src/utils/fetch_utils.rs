use std::time::Duration;

use ballot_registry::{Digest, EMPTY_ROOT};
use proof_service::SyncStatus;

use super::data_types::ProgramTestContext;

const SYNC_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a ballot with an empty whitelist, as the operator would.
pub fn create_ballot(context: &ProgramTestContext, proposals: &[&str]) -> u64 {
    context
        .ledger
        .create_ballot(EMPTY_ROOT, proposals.iter().map(|p| p.to_string()).collect())
        .unwrap()
}

/// Whitelist `voters` on the ballot and wait until the ledger holds the root.
pub async fn whitelist_and_sync(
    context: &ProgramTestContext,
    ballot_id: u64,
    voters: &[ballot_registry::Identity],
) -> anyhow::Result<Digest> {
    let update = context.service.add_to_whitelist(ballot_id, voters).await?;
    let state = context.service.wait_for_sync(ballot_id, SYNC_TIMEOUT).await?;
    assert_eq!(state.status, SyncStatus::Confirmed);
    assert_eq!(state.root, update.merkle_root);
    Ok(update.merkle_root)
}

pub fn vote_counts(context: &ProgramTestContext, ballot_id: u64) -> Vec<u64> {
    context.ledger.ballot(ballot_id).unwrap().tally
}
