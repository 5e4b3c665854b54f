use crate::{error::ErrorCode, require, Ballot, Context, Digest, RegistryEvent, RegistryState, Result};

pub fn handler(
    ctx: &Context,
    state: &mut RegistryState,
    merkle_root: Digest,
    proposal_names: Vec<String>,
) -> Result<u64> {
    require!(!proposal_names.is_empty(), ErrorCode::EmptyProposalList);
    state.config.check_create(&ctx.signer)?;

    let ballot_id = state.next_ballot_id();
    state.ballots.push(Ballot::new(
        ballot_id,
        ctx.signer,
        merkle_root,
        proposal_names.clone(),
    ));
    state.emit(RegistryEvent::BallotCreated {
        ballot_id,
        proposal_names,
    });

    Ok(ballot_id)
}
