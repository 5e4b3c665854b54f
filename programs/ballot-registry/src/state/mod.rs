pub mod ballot;
pub mod event;
pub mod identity;
pub mod program_config;

pub use ballot::*;
pub use event::*;
pub use identity::*;
pub use program_config::*;

use crate::{error::ErrorCode, Result};

/// Ledger-side storage: an arena of ballots indexed by ballot ID (offset by the
/// configured first ID), plus the event log.
#[derive(Debug, Default)]
pub struct RegistryState {
    pub config: ProgramConfig,
    pub ballots: Vec<Ballot>,
    pub events: Vec<RegistryEvent>,
}

impl RegistryState {
    pub fn new(config: ProgramConfig) -> Self {
        Self {
            config,
            ballots: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn next_ballot_id(&self) -> u64 {
        self.config.first_ballot_id + self.ballots.len() as u64
    }

    fn index_of(&self, ballot_id: u64) -> Option<usize> {
        ballot_id
            .checked_sub(self.config.first_ballot_id)
            .and_then(|offset| usize::try_from(offset).ok())
    }

    pub fn ballot(&self, ballot_id: u64) -> Result<&Ballot> {
        self.index_of(ballot_id)
            .and_then(|idx| self.ballots.get(idx))
            .ok_or(ErrorCode::UnknownBallot)
    }

    pub fn ballot_mut(&mut self, ballot_id: u64) -> Result<&mut Ballot> {
        self.index_of(ballot_id)
            .and_then(|idx| self.ballots.get_mut(idx))
            .ok_or(ErrorCode::UnknownBallot)
    }

    pub fn emit(&mut self, event: RegistryEvent) {
        log::debug!("event: {:?}", event);
        self.events.push(event);
    }
}
