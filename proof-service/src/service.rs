//! ProofService: one live Merkle accumulator per ballot, kept in step with the
//! persisted whitelist and pushed to the ledger through the outbox.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use ballot_cli::MerkleAccumulator;
use ballot_registry::{Digest, Identity, EMPTY_ROOT};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::database::{Database, WhitelistEntryRecord};
use crate::error::ServiceError;
use crate::ledger::RootPublisher;
use crate::metrics::{self, ProofLookup};
use crate::sync::{OutboxWorker, PushCommand, RetryPolicy, SyncBoard, SyncState, SyncStatus};

/// Result of a whitelist mutation.
#[derive(Debug, Clone)]
pub struct WhitelistUpdate {
    pub ballot_id: u64,
    pub merkle_root: Digest,
    pub addresses: usize,
    /// Identities that were not already on the whitelist.
    pub added: u64,
    pub sync: SyncState,
}

/// Inclusion proof lookup. `is_whitelisted == false` comes with an empty proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofLookupResult {
    pub ballot_id: u64,
    pub identity: Identity,
    pub proof: Vec<Digest>,
    pub merkle_root: Digest,
    pub is_whitelisted: bool,
    pub sync_status: SyncStatus,
}

#[derive(Clone)]
pub struct ProofService {
    inner: Arc<Inner>,
}

struct Inner {
    db: Database,
    trees: RwLock<HashMap<u64, Arc<MerkleAccumulator>>>,
    rebuild_locks: Mutex<HashMap<u64, Arc<tokio::sync::Mutex<()>>>>,
    board: Arc<SyncBoard>,
    outbox: mpsc::UnboundedSender<PushCommand>,
}

impl ProofService {
    /// Rebuild every persisted ballot's tree, start the push worker and queue a
    /// reconciling push per ballot. The worker confirms without writing when the
    /// ledger already holds the root.
    pub async fn start(
        db: Database,
        publisher: Arc<dyn RootPublisher>,
        policy: RetryPolicy,
    ) -> Result<(Self, JoinHandle<()>), ServiceError> {
        let board = Arc::new(SyncBoard::default());
        let (outbox, rx) = mpsc::unbounded_channel();
        let worker = OutboxWorker::new(publisher, Arc::clone(&board), policy, rx);

        let service = ProofService {
            inner: Arc::new(Inner {
                db,
                trees: RwLock::new(HashMap::new()),
                rebuild_locks: Mutex::new(HashMap::new()),
                board,
                outbox,
            }),
        };

        service.bootstrap().await?;
        let handle = tokio::spawn(worker.run());

        Ok((service, handle))
    }

    async fn bootstrap(&self) -> Result<(), ServiceError> {
        let grouped = WhitelistEntryRecord::load_all(self.inner.db.pool()).await?;
        info!("Bootstrapping {} ballot whitelist(s)", grouped.len());

        for (ballot_id, identities) in grouped {
            let tree = Arc::new(MerkleAccumulator::build(identities)?);
            debug!(
                "Ballot {} rebuilt with {} identities, depth {}",
                ballot_id,
                tree.len(),
                tree.depth()
            );
            self.install(ballot_id, tree);
        }
        Ok(())
    }

    /// Seed the whitelist of a ballot the ledger has just issued. Fails with
    /// `BallotIdReused` when the store already holds entries under that ID,
    /// which happens when the store outlived the ledger that issued them.
    /// Returns `None` when there is nothing to seed.
    pub async fn seed_whitelist(
        &self,
        ballot_id: u64,
        identities: &[Identity],
    ) -> Result<Option<WhitelistUpdate>, ServiceError> {
        let lock = self.rebuild_lock(ballot_id);
        let _guard = lock.lock().await;

        let pool = self.inner.db.pool();
        let persisted = WhitelistEntryRecord::count_for_ballot(pool, ballot_id).await?;
        if persisted > 0 || self.tree(ballot_id).is_some() {
            warn!(
                "Refusing to seed ballot {}: {} entries already persisted",
                ballot_id, persisted
            );
            return Err(ServiceError::BallotIdReused(ballot_id));
        }

        if identities.is_empty() {
            return Ok(None);
        }
        self.apply_locked(ballot_id, identities).await.map(Some)
    }

    /// Append identities to a ballot's whitelist, rebuild its tree and queue a
    /// root push. Nothing is queued when every identity was already present.
    pub async fn add_to_whitelist(
        &self,
        ballot_id: u64,
        identities: &[Identity],
    ) -> Result<WhitelistUpdate, ServiceError> {
        if identities.is_empty() {
            return Err(ServiceError::EmptyBatch);
        }

        let lock = self.rebuild_lock(ballot_id);
        let _guard = lock.lock().await;
        self.apply_locked(ballot_id, identities).await
    }

    /// Caller holds the ballot's rebuild lock.
    async fn apply_locked(
        &self,
        ballot_id: u64,
        identities: &[Identity],
    ) -> Result<WhitelistUpdate, ServiceError> {
        let pool = self.inner.db.pool();
        let added = WhitelistEntryRecord::insert_batch(pool, ballot_id, identities).await?;
        metrics::record_whitelist_added(added);

        if added == 0 {
            if let (Some(tree), Some(sync)) = (self.tree(ballot_id), self.sync_state(ballot_id)) {
                debug!("Whitelist for ballot {} unchanged", ballot_id);
                return Ok(WhitelistUpdate {
                    ballot_id,
                    merkle_root: tree.root(),
                    addresses: tree.len(),
                    added,
                    sync,
                });
            }
        }

        let entries = WhitelistEntryRecord::list_for_ballot(pool, ballot_id).await?;
        let tree = Arc::new(MerkleAccumulator::build(
            entries.into_iter().map(|entry| entry.identity),
        )?);
        let root = tree.root();
        let addresses = tree.len();

        let sync = self.install(ballot_id, tree);

        info!(
            "Whitelist for ballot {}: {} new, {} total",
            ballot_id, added, addresses
        );

        Ok(WhitelistUpdate {
            ballot_id,
            merkle_root: root,
            addresses,
            added,
            sync,
        })
    }

    /// Inclusion proof for `identity` against the ballot's live tree.
    pub fn generate_proof(&self, ballot_id: u64, identity: &Identity) -> ProofLookupResult {
        // Tree first: a pending state is always recorded before its tree is
        // swapped in, so the state read next is at least as new as the tree.
        let tree = self.tree(ballot_id);
        let sync = self.sync_state(ballot_id);

        let (proof, merkle_root, lookup) = match tree {
            Some(tree) => match tree.proof(identity) {
                Ok(proof) => (proof, tree.root(), ProofLookup::Found),
                Err(_) => (Vec::new(), tree.root(), ProofLookup::NotWhitelisted),
            },
            None => (Vec::new(), EMPTY_ROOT, ProofLookup::NoTree),
        };
        metrics::record_proof_lookup(lookup);

        let sync_status = sync
            .map(|state| state.status_for(&merkle_root))
            .unwrap_or(SyncStatus::Confirmed);

        ProofLookupResult {
            ballot_id,
            identity: *identity,
            is_whitelisted: lookup == ProofLookup::Found,
            proof,
            merkle_root,
            sync_status,
        }
    }

    pub fn addresses(&self, ballot_id: u64) -> usize {
        self.tree(ballot_id).map(|tree| tree.len()).unwrap_or(0)
    }

    pub fn current_root(&self, ballot_id: u64) -> Digest {
        self.tree(ballot_id)
            .map(|tree| tree.root())
            .unwrap_or(EMPTY_ROOT)
    }

    pub fn sync_state(&self, ballot_id: u64) -> Option<SyncState> {
        self.inner.board.get(ballot_id)
    }

    /// Ballot IDs that have a live tree, ascending.
    pub fn ballot_ids(&self) -> Vec<u64> {
        let trees = self.inner.trees.read().expect("tree cache lock poisoned");
        let mut ids: Vec<u64> = trees.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Wait until the ballot's latest root is confirmed or has failed.
    pub async fn wait_for_sync(
        &self,
        ballot_id: u64,
        timeout: Duration,
    ) -> Result<SyncState, ServiceError> {
        let mut rx = self
            .inner
            .board
            .subscribe(ballot_id)
            .ok_or(ServiceError::NoSyncState(ballot_id))?;

        let waited = tokio::time::timeout(timeout, async {
            rx.wait_for(|state| state.status != SyncStatus::Pending)
                .await
                .map(|state| (*state).clone())
        })
        .await;

        match waited {
            Ok(Ok(state)) => Ok(state),
            _ => Err(ServiceError::RootPushPending(ballot_id)),
        }
    }

    /// Queue the ballot's current root again after a failed push.
    pub async fn retry_push(&self, ballot_id: u64) -> Result<SyncState, ServiceError> {
        let lock = self.rebuild_lock(ballot_id);
        let _guard = lock.lock().await;

        let state = self
            .sync_state(ballot_id)
            .ok_or(ServiceError::NoSyncState(ballot_id))?;
        if state.status != SyncStatus::Failed {
            return Err(ServiceError::NothingToRetry(ballot_id));
        }

        warn!(
            "Retrying root push for ballot {} after {} failed attempt(s)",
            ballot_id, state.attempts
        );
        Ok(self.enqueue(ballot_id, self.current_root(ballot_id)))
    }

    pub fn tree(&self, ballot_id: u64) -> Option<Arc<MerkleAccumulator>> {
        let trees = self.inner.trees.read().expect("tree cache lock poisoned");
        trees.get(&ballot_id).cloned()
    }

    pub fn database(&self) -> &Database {
        &self.inner.db
    }

    fn swap_tree(&self, ballot_id: u64, tree: Arc<MerkleAccumulator>) {
        let mut trees = self.inner.trees.write().expect("tree cache lock poisoned");
        trees.insert(ballot_id, tree);
    }

    fn rebuild_lock(&self, ballot_id: u64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .inner
            .rebuild_locks
            .lock()
            .expect("rebuild lock table poisoned");
        Arc::clone(locks.entry(ballot_id).or_default())
    }

    /// Mark the tree's root pending, swap the tree in, then hand the push to
    /// the worker.
    fn install(&self, ballot_id: u64, tree: Arc<MerkleAccumulator>) -> SyncState {
        let (cmd, state) = self.inner.board.begin(ballot_id, tree.root());
        self.swap_tree(ballot_id, tree);
        self.send(cmd);
        state
    }

    fn enqueue(&self, ballot_id: u64, root: Digest) -> SyncState {
        let (cmd, state) = self.inner.board.begin(ballot_id, root);
        self.send(cmd);
        state
    }

    fn send(&self, cmd: PushCommand) {
        let ballot_id = cmd.ballot_id;
        if self.inner.outbox.send(cmd).is_err() {
            warn!("Root-push worker is gone; ballot {} stays pending", ballot_id);
        }
    }
}
