//! Off-ledger half of whitelisted ballots: keeps one Merkle accumulator per
//! ballot over a persisted whitelist, serves inclusion proofs, and pushes every
//! new root to the ballot registry through a retrying outbox.

pub mod auth_middleware;
pub mod config;
pub mod database;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod service;
pub mod state;
pub mod sync;
pub mod types;
pub mod utils;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use ledger::{LedgerError, LocalLedger, RootPublisher};
pub use service::{ProofLookupResult, ProofService, WhitelistUpdate};
pub use state::AppState;
pub use sync::{RetryPolicy, SyncState, SyncStatus};
