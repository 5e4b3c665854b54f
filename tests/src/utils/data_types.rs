use std::sync::Arc;

use ballot_registry::Identity;
use proof_service::{LocalLedger, ProofService};

pub struct ProgramTestContext {
    pub ledger: Arc<LocalLedger>,
    pub service: ProofService,
    /// Whitelisted on every ballot the flow creates.
    pub voters: Vec<Identity>,
    /// Never whitelisted.
    pub outsider: Identity,
}
