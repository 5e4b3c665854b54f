use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn git_hash() -> Option<String> {
    let out = Command::new("git")
        .args(["rev-parse", "--short=12", "HEAD"])
        .output()
        .ok()?;
    out.status
        .success()
        .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// `SOURCE_DATE_EPOCH` wins so reproducible builds embed a fixed time.
fn build_time() -> String {
    if let Ok(epoch) = std::env::var("SOURCE_DATE_EPOCH") {
        return epoch;
    }
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    if let Some(hash) = git_hash() {
        println!("cargo:rustc-env=PROOF_SERVICE_BUILD_GIT_HASH={}", hash);
    }
    println!("cargo:rustc-env=PROOF_SERVICE_BUILD_TIME_UNIX={}", build_time());
}
