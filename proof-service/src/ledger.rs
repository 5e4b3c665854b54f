//! Ledger host boundary.
//!
//! `RootPublisher` is the seam the outbox worker pushes roots through. Its
//! calls are blocking and may fail; the worker runs them on the blocking pool.
//! `LocalLedger` hosts a `BallotRegistry` in process behind a single mutex,
//! giving every ledger call the same total order a serialized ledger would.

use std::sync::Mutex;

use ballot_registry::{
    Ballot, BallotRegistry, Context, Digest, ErrorCode, Identity, ProgramConfig,
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The registry refused the call. Repeating it will not help.
    #[error("rejected by registry: {0}")]
    Rejected(#[from] ErrorCode),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_))
    }
}

pub trait RootPublisher: Send + Sync + 'static {
    /// Store `root` as the ballot's on-ledger Merkle root.
    fn publish_root(&self, ballot_id: u64, root: Digest) -> Result<(), LedgerError>;

    /// Read the ballot's current on-ledger Merkle root.
    fn fetch_root(&self, ballot_id: u64) -> Result<Digest, LedgerError>;
}

#[derive(Debug)]
pub struct LocalLedger {
    registry: Mutex<BallotRegistry>,
    operator: Identity,
}

impl LocalLedger {
    pub fn new(config: ProgramConfig, operator: Identity) -> Self {
        let registry = BallotRegistry::new(config);
        info!(
            "Ledger hosted in process, policy {}, operator {}",
            registry.config().policy,
            operator
        );
        Self {
            registry: Mutex::new(registry),
            operator,
        }
    }

    /// Identity the service signs its own ledger calls with.
    pub fn operator(&self) -> Identity {
        self.operator
    }

    /// Run one mutating call against the registry. Calls are totally ordered.
    pub fn transact<T>(
        &self,
        f: impl FnOnce(&mut BallotRegistry) -> ballot_registry::Result<T>,
    ) -> Result<T, LedgerError> {
        let mut registry = self.registry.lock().expect("ledger mutex poisoned");
        Ok(f(&mut registry)?)
    }

    /// Run one read-only call against the registry.
    pub fn view<T>(
        &self,
        f: impl FnOnce(&BallotRegistry) -> ballot_registry::Result<T>,
    ) -> Result<T, LedgerError> {
        let registry = self.registry.lock().expect("ledger mutex poisoned");
        Ok(f(&registry)?)
    }

    /// Create a ballot signed by the operator identity.
    pub fn create_ballot(&self, root: Digest, proposals: Vec<String>) -> Result<u64, LedgerError> {
        let ctx = Context::new(self.operator);
        self.transact(|registry| registry.create_ballot(&ctx, root, proposals))
    }

    pub fn vote(
        &self,
        voter: Identity,
        ballot_id: u64,
        proposal_index: usize,
        proof: &[Digest],
    ) -> Result<(), LedgerError> {
        let ctx = Context::new(voter);
        self.transact(|registry| registry.vote(&ctx, ballot_id, proposal_index, proof))
    }

    pub fn close_ballot(&self, ballot_id: u64) -> Result<(), LedgerError> {
        let ctx = Context::new(self.operator);
        self.transact(|registry| registry.close_ballot(&ctx, ballot_id))
    }

    pub fn ballot(&self, ballot_id: u64) -> Result<Ballot, LedgerError> {
        self.view(|registry| registry.get_ballot(ballot_id).cloned())
    }

    pub fn ballot_count(&self) -> u64 {
        self.registry
            .lock()
            .expect("ledger mutex poisoned")
            .ballot_count()
    }
}

impl RootPublisher for LocalLedger {
    fn publish_root(&self, ballot_id: u64, root: Digest) -> Result<(), LedgerError> {
        debug!("Publishing root for ballot {}", ballot_id);
        let ctx = Context::new(self.operator);
        self.transact(|registry| registry.update_merkle_root(&ctx, ballot_id, root))
    }

    fn fetch_root(&self, ballot_id: u64) -> Result<Digest, LedgerError> {
        self.view(|registry| registry.get_merkle_root(ballot_id))
    }
}
