#![allow(dead_code)]

use std::process::{Command, Stdio};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex,
};
use std::{
    net::TcpListener,
    path::{Path, PathBuf},
    time::Duration,
};

use ballot_registry::{Digest, Identity};
use proof_service::{LedgerError, LocalLedger, RootPublisher};
use reqwest::Client;
use tokio::time::sleep;

/// Get an available ephemeral port on localhost.
pub fn find_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Resolve the proof-service binary path from Cargo or common target dirs.
pub fn resolve_binary_path() -> String {
    if let Some(p) = option_env!("CARGO_BIN_EXE_proof-service") {
        return p.to_string();
    }

    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest.parent().unwrap_or(&manifest).to_path_buf();
    let candidates = [
        workspace_root.join("target/debug/proof-service"),
        workspace_root.join("target/release/proof-service"),
    ];
    for cand in candidates.iter() {
        if Path::new(&cand).exists() {
            return cand.to_string_lossy().to_string();
        }
    }

    "proof-service".to_string()
}

/// Poll /healthz until the server responds OK or timeout.
pub async fn wait_ready(base: &str, timeout_ms: u64) -> anyhow::Result<()> {
    let client = Client::new();
    let mut waited = 0u64;
    loop {
        if waited >= timeout_ms {
            anyhow::bail!("server not ready after {}ms", timeout_ms);
        }
        if let Ok(resp) = client.get(format!("{}/healthz", base)).send().await {
            if resp.status().is_success() {
                return Ok(());
            }
        }
        sleep(Duration::from_millis(50)).await;
        waited += 50;
    }
}

// Struct that ensures the child process is killed on drop
pub struct ChildGuard(std::process::Child);
impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
    }
}

pub async fn setup_server(operator_token: &str) -> anyhow::Result<(String, ChildGuard)> {
    let bin = resolve_binary_path();
    assert!(Path::new(&bin).exists(), "binary not found at {}", bin);

    let port = find_free_port();
    let base_url = format!("http://127.0.0.1:{}", port);

    let child = Command::new(&bin)
        .env("DB_PATH", ":memory:")
        .env("PORT", port.to_string())
        .env("OPERATOR_TOKEN", operator_token)
        .env("SYNC_WAIT_MS", "3000")
        .env("RATE_LIMIT_PER_SECOND", "1000")
        .env("RATE_LIMIT_BURST", "1000")
        .env("RUST_LOG", "info")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    // Ensure we always try to kill the child on exit
    let guard = ChildGuard(child);

    wait_ready(&base_url, 10_000).await?;

    Ok((base_url, guard))
}

pub fn identity(byte: u8) -> Identity {
    Identity::new([byte; 32])
}

/// Ledger wrapper whose root writes fail a configurable number of times
/// before reaching the registry, or forever.
pub struct FlakyPublisher {
    pub inner: Arc<LocalLedger>,
    failures_left: AtomicU32,
    pub publishes: AtomicU32,
    pub blocked: Mutex<bool>,
}

impl FlakyPublisher {
    pub fn new(inner: Arc<LocalLedger>, failures: u32) -> Self {
        Self {
            inner,
            failures_left: AtomicU32::new(failures),
            publishes: AtomicU32::new(0),
            blocked: Mutex::new(false),
        }
    }

    pub fn set_blocked(&self, blocked: bool) {
        *self.blocked.lock().unwrap() = blocked;
    }
}

impl RootPublisher for FlakyPublisher {
    fn publish_root(&self, ballot_id: u64, root: Digest) -> Result<(), LedgerError> {
        if *self.blocked.lock().unwrap() {
            return Err(LedgerError::Unavailable("ledger offline".into()));
        }
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(LedgerError::Unavailable("transient outage".into()));
        }
        self.publishes.fetch_add(1, Ordering::SeqCst);
        self.inner.publish_root(ballot_id, root)
    }

    fn fetch_root(&self, ballot_id: u64) -> Result<Digest, LedgerError> {
        self.inner.fetch_root(ballot_id)
    }
}
