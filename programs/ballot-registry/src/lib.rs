//! Ledger-side registry of whitelisted ballots.
//!
//! Each ballot stores the merkle root of its voter whitelist. A vote carries an
//! inclusion proof for the signer's identity, checked against the root the
//! ballot holds at the moment the vote executes.
//!
//! The registry assumes the host executes calls one at a time; it does no
//! locking of its own.

pub mod error;
pub mod instructions;
pub mod merkle_helper;
pub mod state;

pub use error::{ErrorCode, ErrorKind, Result};
pub use instructions::*;
pub use state::*;

/// Per-call context supplied by the ledger host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// Identity that signed the call.
    pub signer: Identity,
}

impl Context {
    pub fn new(signer: Identity) -> Self {
        Self { signer }
    }
}

#[derive(Debug, Default)]
pub struct BallotRegistry {
    state: RegistryState,
}

impl BallotRegistry {
    pub fn new(config: ProgramConfig) -> Self {
        Self {
            state: RegistryState::new(config),
        }
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.state.config
    }

    pub fn create_ballot(
        &mut self,
        ctx: &Context,
        merkle_root: Digest,
        proposal_names: Vec<String>,
    ) -> Result<u64> {
        create_ballot::handler(ctx, &mut self.state, merkle_root, proposal_names)
    }

    pub fn vote(
        &mut self,
        ctx: &Context,
        ballot_id: u64,
        proposal_index: usize,
        proof: &[Digest],
    ) -> Result<()> {
        cast_vote::handler(ctx, &mut self.state, ballot_id, proposal_index, proof)
    }

    pub fn update_merkle_root(
        &mut self,
        ctx: &Context,
        ballot_id: u64,
        new_root: Digest,
    ) -> Result<()> {
        update_merkle_root::handler(ctx, &mut self.state, ballot_id, new_root)
    }

    pub fn close_ballot(&mut self, ctx: &Context, ballot_id: u64) -> Result<()> {
        close_ballot::handler(ctx, &mut self.state, ballot_id)
    }

    pub fn get_vote_count(&self, ballot_id: u64, proposal_index: usize) -> Result<u64> {
        self.state.ballot(ballot_id)?.vote_count(proposal_index)
    }

    pub fn has_voted(&self, ballot_id: u64, identity: &Identity) -> Result<bool> {
        Ok(self.state.ballot(ballot_id)?.has_voted(identity))
    }

    pub fn get_proposal_names(&self, ballot_id: u64) -> Result<Vec<String>> {
        Ok(self.state.ballot(ballot_id)?.proposals.clone())
    }

    pub fn get_merkle_root(&self, ballot_id: u64) -> Result<Digest> {
        Ok(self.state.ballot(ballot_id)?.merkle_root)
    }

    pub fn is_active(&self, ballot_id: u64) -> Result<bool> {
        Ok(self.state.ballot(ballot_id)?.active)
    }

    pub fn get_ballot(&self, ballot_id: u64) -> Result<&Ballot> {
        self.state.ballot(ballot_id)
    }

    pub fn ballot_count(&self) -> u64 {
        self.state.ballots.len() as u64
    }

    /// ID the next successful `create_ballot` will return.
    pub fn next_ballot_id(&self) -> u64 {
        self.state.next_ballot_id()
    }

    /// Events emitted so far, oldest first.
    pub fn events(&self) -> &[RegistryEvent] {
        &self.state.events
    }
}
