//! Root-push outbox.
//!
//! Every whitelist change produces a `PushCommand` carrying the new root and a
//! per-ballot generation number. A single worker drains the queue in order and
//! pushes each root to the ledger with bounded exponential backoff. Commands
//! whose generation is older than the ballot's latest are dropped unapplied.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ballot_registry::Digest;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::ledger::{LedgerError, RootPublisher};
use crate::metrics::{self, PushOutcome};
use crate::types::serialize_digest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Confirmed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Confirmed => "confirmed",
            SyncStatus::Failed => "failed",
        }
    }
}

/// Where the latest root of one ballot stands relative to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncState {
    pub status: SyncStatus,
    #[serde(serialize_with = "serialize_digest")]
    pub root: Digest,
    pub generation: u64,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SyncState {
    /// Status as seen by a reader holding a tree with `root`. A state recorded
    /// for any other root says nothing about that tree, so it reads as pending.
    pub fn status_for(&self, root: &Digest) -> SyncStatus {
        if &self.root == root {
            self.status
        } else {
            SyncStatus::Pending
        }
    }

    fn pending(root: Digest, generation: u64) -> Self {
        Self {
            status: SyncStatus::Pending,
            root,
            generation,
            attempts: 0,
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushCommand {
    pub ballot_id: u64,
    pub root: Digest,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based), doubling up to the cap.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Per-ballot sync state, observable through watch channels.
#[derive(Debug, Default)]
pub struct SyncBoard {
    states: Mutex<HashMap<u64, watch::Sender<SyncState>>>,
}

impl SyncBoard {
    /// Record a new root for the ballot as pending. Returns the command that
    /// pushes it together with the fresh state.
    pub fn begin(&self, ballot_id: u64, root: Digest) -> (PushCommand, SyncState) {
        let mut states = self.states.lock().expect("sync board mutex poisoned");
        let state = match states.get(&ballot_id) {
            Some(tx) => {
                let state = SyncState::pending(root, tx.borrow().generation + 1);
                tx.send_replace(state.clone());
                state
            }
            None => {
                let state = SyncState::pending(root, 1);
                let (tx, _) = watch::channel(state.clone());
                states.insert(ballot_id, tx);
                state
            }
        };

        let cmd = PushCommand {
            ballot_id,
            root,
            generation: state.generation,
        };
        (cmd, state)
    }

    pub fn get(&self, ballot_id: u64) -> Option<SyncState> {
        let states = self.states.lock().expect("sync board mutex poisoned");
        states.get(&ballot_id).map(|tx| tx.borrow().clone())
    }

    pub fn subscribe(&self, ballot_id: u64) -> Option<watch::Receiver<SyncState>> {
        let states = self.states.lock().expect("sync board mutex poisoned");
        states.get(&ballot_id).map(|tx| tx.subscribe())
    }

    /// True when a newer root than the command's has been recorded since.
    pub fn is_superseded(&self, cmd: &PushCommand) -> bool {
        self.get(cmd.ballot_id)
            .map(|state| state.generation > cmd.generation)
            .unwrap_or(true)
    }

    /// Apply `f` to the ballot's state only if it still belongs to `cmd`.
    fn update(&self, cmd: &PushCommand, f: impl FnOnce(&mut SyncState)) {
        let states = self.states.lock().expect("sync board mutex poisoned");
        if let Some(tx) = states.get(&cmd.ballot_id) {
            tx.send_if_modified(|state| {
                if state.generation != cmd.generation {
                    return false;
                }
                f(state);
                state.updated_at = Utc::now();
                true
            });
        }
    }

    fn record_attempt(&self, cmd: &PushCommand, attempts: u32, err: &LedgerError) {
        self.update(cmd, |state| {
            state.attempts = attempts;
            state.last_error = Some(err.to_string());
        });
    }

    fn confirm(&self, cmd: &PushCommand, attempts: u32) {
        self.update(cmd, |state| {
            state.status = SyncStatus::Confirmed;
            state.attempts = attempts;
            state.last_error = None;
        });
    }

    fn fail(&self, cmd: &PushCommand, attempts: u32, err: &LedgerError) {
        self.update(cmd, |state| {
            state.status = SyncStatus::Failed;
            state.attempts = attempts;
            state.last_error = Some(err.to_string());
        });
    }
}

enum PushResult {
    Published,
    AlreadyCurrent,
}

pub struct OutboxWorker {
    publisher: Arc<dyn RootPublisher>,
    board: Arc<SyncBoard>,
    policy: RetryPolicy,
    rx: mpsc::UnboundedReceiver<PushCommand>,
}

impl OutboxWorker {
    pub fn new(
        publisher: Arc<dyn RootPublisher>,
        board: Arc<SyncBoard>,
        policy: RetryPolicy,
        rx: mpsc::UnboundedReceiver<PushCommand>,
    ) -> Self {
        Self {
            publisher,
            board,
            policy,
            rx,
        }
    }

    /// Drain commands until every sender is dropped.
    pub async fn run(mut self) {
        info!("Root-push worker started");
        while let Some(cmd) = self.rx.recv().await {
            if self.board.is_superseded(&cmd) {
                debug!(
                    "Dropping superseded push for ballot {} (generation {})",
                    cmd.ballot_id, cmd.generation
                );
                metrics::record_push_outcome(PushOutcome::Superseded);
                continue;
            }
            self.push(cmd).await;
        }
        info!("Root-push worker stopped");
    }

    async fn push(&self, cmd: PushCommand) {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.attempt(cmd).await {
                Ok(result) => {
                    let outcome = match result {
                        PushResult::Published => PushOutcome::Published,
                        PushResult::AlreadyCurrent => PushOutcome::AlreadyCurrent,
                    };
                    info!(
                        "Root for ballot {} confirmed after {} attempt(s) ({:?})",
                        cmd.ballot_id, attempts, outcome
                    );
                    self.board.confirm(&cmd, attempts);
                    metrics::record_push_outcome(outcome);
                    return;
                }
                Err(e) if e.is_transient() && attempts < self.policy.max_attempts => {
                    let delay = self.policy.backoff(attempts);
                    warn!(
                        "Root push for ballot {} failed (attempt {}/{}): {}; retrying in {:?}",
                        cmd.ballot_id, attempts, self.policy.max_attempts, e, delay
                    );
                    self.board.record_attempt(&cmd, attempts, &e);
                    metrics::record_push_outcome(PushOutcome::Retried);
                    tokio::time::sleep(delay).await;

                    if self.board.is_superseded(&cmd) {
                        debug!("Push for ballot {} superseded during backoff", cmd.ballot_id);
                        metrics::record_push_outcome(PushOutcome::Superseded);
                        return;
                    }
                }
                Err(e) => {
                    error!(
                        "ALARM: root push for ballot {} gave up after {} attempt(s): {}",
                        cmd.ballot_id, attempts, e
                    );
                    self.board.fail(&cmd, attempts, &e);
                    metrics::record_push_outcome(PushOutcome::Failed);
                    return;
                }
            }
        }
    }

    /// One blocking round trip: skip the write when the ledger already holds
    /// the root.
    async fn attempt(&self, cmd: PushCommand) -> Result<PushResult, LedgerError> {
        let publisher = Arc::clone(&self.publisher);
        tokio::task::spawn_blocking(move || {
            if publisher.fetch_root(cmd.ballot_id)? == cmd.root {
                return Ok(PushResult::AlreadyCurrent);
            }
            publisher.publish_root(cmd.ballot_id, cmd.root)?;
            Ok(PushResult::Published)
        })
        .await
        .unwrap_or_else(|e| Err(LedgerError::Unavailable(format!("push task failed: {}", e))))
    }
}
