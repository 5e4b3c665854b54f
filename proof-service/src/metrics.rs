use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::OnceCell;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PushOutcome {
    Published,
    AlreadyCurrent,
    Retried,
    Superseded,
    Failed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ProofLookup {
    Found,
    NotWhitelisted,
    NoTree,
}

pub struct Metrics {
    root_push_total: HashMap<PushOutcome, u64>,
    proof_lookup_total: HashMap<ProofLookup, u64>,
    whitelist_added_total: u64,
}

static METRICS: OnceCell<Mutex<Metrics>> = OnceCell::new();

fn get() -> &'static Mutex<Metrics> {
    METRICS.get_or_init(|| {
        Mutex::new(Metrics {
            root_push_total: HashMap::new(),
            proof_lookup_total: HashMap::new(),
            whitelist_added_total: 0,
        })
    })
}

pub fn record_push_outcome(outcome: PushOutcome) {
    let mut m = get().lock().expect("metrics mutex poisoned");
    *m.root_push_total.entry(outcome).or_insert(0) += 1;
}

pub fn record_proof_lookup(lookup: ProofLookup) {
    let mut m = get().lock().expect("metrics mutex poisoned");
    *m.proof_lookup_total.entry(lookup).or_insert(0) += 1;
}

pub fn record_whitelist_added(count: u64) {
    let mut m = get().lock().expect("metrics mutex poisoned");
    m.whitelist_added_total += count;
}

pub fn push_outcome_count(outcome: PushOutcome) -> u64 {
    let m = get().lock().expect("metrics mutex poisoned");
    m.root_push_total.get(&outcome).copied().unwrap_or(0)
}

pub fn snapshot_as_json(db_path: &str) -> serde_json::Value {
    use serde_json::json;
    let m = get().lock().expect("metrics mutex poisoned");

    let pushes: Vec<serde_json::Value> = m
        .root_push_total
        .iter()
        .map(|(outcome, count)| {
            json!({
                "outcome": match outcome {
                    PushOutcome::Published => "published",
                    PushOutcome::AlreadyCurrent => "already_current",
                    PushOutcome::Retried => "retried",
                    PushOutcome::Superseded => "superseded",
                    PushOutcome::Failed => "failed",
                },
                "count": count
            })
        })
        .collect();

    let lookups: Vec<serde_json::Value> = m
        .proof_lookup_total
        .iter()
        .map(|(lookup, count)| {
            json!({
                "result": match lookup {
                    ProofLookup::Found => "found",
                    ProofLookup::NotWhitelisted => "not_whitelisted",
                    ProofLookup::NoTree => "no_tree",
                },
                "count": count
            })
        })
        .collect();

    let db_mb = db_size_bytes(db_path).map(|b| round2(bytes_to_mb(b)));
    let fs_free_mb = filesystem_free_mb_from_db_path(db_path);

    json!({
        "root_push_total": pushes,
        "proof_lookup_total": lookups,
        "whitelist_added_total": m.whitelist_added_total,
        "storage": {
            "db_path": db_path,
            "db_size_mb": db_mb,
            "free_storage_mb": fs_free_mb,
        }
    })
}

fn db_size_bytes(db_path: &str) -> Option<u64> {
    std::fs::metadata(db_path)
        .ok()
        .and_then(|m| if m.is_file() { Some(m.len()) } else { None })
}

fn bytes_to_mb(bytes: u64) -> f64 {
    let mb = 1024.0 * 1024.0;
    (bytes as f64) / mb
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn filesystem_free_mb_from_db_path(db_path: &str) -> Option<f64> {
    use sysinfo::Disks;
    let disks = Disks::new_with_refreshed_list();
    let path = std::path::Path::new(db_path);
    let mount = path.canonicalize().ok().and_then(|p| {
        disks
            .iter()
            .filter(|d| p.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
    });

    mount.map(|d| round2(bytes_to_mb(d.available_space())))
}
