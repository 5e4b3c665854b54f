//! Shared application state

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::ServiceConfig;
use crate::database::{Database, WhitelistEntryRecord};
use crate::ledger::{LocalLedger, RootPublisher};
use crate::service::ProofService;

#[derive(Clone)]
pub struct AppState {
    pub proof_service: ProofService,
    pub ledger: Arc<LocalLedger>,
    pub operator_token: Option<Arc<str>>,
    pub sync_wait: Duration,
    pub db_path: Arc<str>,
}

impl AppState {
    /// Open the store, host the registry and start the proof service. The
    /// returned handle is the root-push worker.
    pub async fn start(config: &ServiceConfig) -> Result<(Self, JoinHandle<()>)> {
        let db = Database::connect(&config.db_path).await?;

        // The hosted ledger starts empty on every run. Number its ballots past
        // anything the store already holds so no persisted whitelist is
        // attached to a ballot it was not written for.
        let first_ballot_id = WhitelistEntryRecord::max_ballot_id(db.pool())
            .await?
            .map_or(0, |id| id + 1);
        let ledger = Arc::new(LocalLedger::new(
            config.program_config().with_first_ballot_id(first_ballot_id),
            config.operator_identity,
        ));
        info!("Ledger host ready, first ballot id {}", first_ballot_id);

        let publisher: Arc<dyn RootPublisher> = ledger.clone();
        let (proof_service, worker) = ProofService::start(db, publisher, config.retry).await?;

        let state = AppState {
            proof_service,
            ledger,
            operator_token: config.operator_token.as_deref().map(Arc::from),
            sync_wait: config.sync_wait,
            db_path: Arc::from(config.db_path.as_str()),
        };
        Ok((state, worker))
    }
}
