use crate::{
    error::ErrorCode, merkle_helper::verify_helper, require, Context, Digest, RegistryEvent,
    RegistryState, Result,
};

pub fn handler(
    ctx: &Context,
    state: &mut RegistryState,
    ballot_id: u64,
    proposal_index: usize,
    proof: &[Digest],
) -> Result<()> {
    let voter = ctx.signer;
    let ballot = state.ballot(ballot_id)?;

    require!(ballot.active, ErrorCode::BallotNotActive);
    require!(
        proposal_index < ballot.proposals.len(),
        ErrorCode::InvalidProposal
    );
    require!(!ballot.has_voted(&voter), ErrorCode::AlreadyVoted);
    verify_helper(voter.as_bytes(), proof, &ballot.merkle_root)?;

    // Every check has passed; compute the new count before touching state so the
    // mutation below cannot fail halfway.
    let new_tally = ballot.tally[proposal_index]
        .checked_add(1)
        .ok_or(ErrorCode::TallyOverflow)?;

    let ballot = state.ballot_mut(ballot_id)?;
    ballot.voted.insert(voter);
    ballot.tally[proposal_index] = new_tally;

    state.emit(RegistryEvent::VoteCast {
        ballot_id,
        identity: voter,
        proposal_index,
    });

    Ok(())
}
