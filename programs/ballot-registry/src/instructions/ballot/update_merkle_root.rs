use crate::{Context, Digest, RegistryEvent, RegistryState, Result};

pub fn handler(
    ctx: &Context,
    state: &mut RegistryState,
    ballot_id: u64,
    new_root: Digest,
) -> Result<()> {
    let ballot = state.ballot(ballot_id)?;
    state.config.check_mutation(&ctx.signer, ballot)?;

    state.ballot_mut(ballot_id)?.merkle_root = new_root;
    state.emit(RegistryEvent::MerkleRootUpdated {
        ballot_id,
        merkle_root: new_root,
    });

    Ok(())
}
