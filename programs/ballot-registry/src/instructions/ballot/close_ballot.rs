use crate::{Context, RegistryEvent, RegistryState, Result};

pub fn handler(ctx: &Context, state: &mut RegistryState, ballot_id: u64) -> Result<()> {
    let ballot = state.ballot(ballot_id)?;
    state.config.check_mutation(&ctx.signer, ballot)?;

    // Closing is terminal; repeated calls change nothing and emit nothing.
    if !ballot.active {
        return Ok(());
    }

    state.ballot_mut(ballot_id)?.active = false;
    state.emit(RegistryEvent::BallotClosed { ballot_id });

    Ok(())
}
