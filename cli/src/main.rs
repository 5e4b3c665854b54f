use anyhow::{anyhow, bail, Context, Result};
use ballot_cli::{utils::*, MerkleAccumulator, WhitelistSnapshot};
use ballot_registry::{encode_digest, merkle_helper::identity_leaf, Digest, Identity};
use clap::Parser;
use log::{info, warn};
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::runtime::Builder;

#[derive(Clone, Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, env, default_value = "http://localhost:3000")]
    pub service_url: String,

    #[arg(long, env)]
    pub operator_token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Clone)]
pub enum Commands {
    BuildSnapshot {
        #[arg(long, help = "Id of the ballot the whitelist belongs to")]
        ballot_id: u64,

        #[arg(long, help = "File with one base-58 identity per line")]
        whitelist_path: PathBuf,

        #[arg(long, default_value = "./whitelist_snapshot.bin", help = "Path to save snapshot")]
        save_path: PathBuf,

        #[arg(long, default_value = "true")]
        is_compressed: bool,
    },
    LogSnapshotRoot {
        #[arg(long, env, help = "Path to read snapshot")]
        read_path: PathBuf,

        #[arg(long, default_value = "true")]
        is_compressed: bool,
    },
    GetProof {
        #[arg(long, env, help = "Path to read snapshot")]
        read_path: PathBuf,

        #[arg(long, value_parser = parse_identity)]
        identity: Identity,

        #[arg(long, default_value = "true")]
        is_compressed: bool,
    },
    VerifyProof {
        #[arg(long, value_parser = parse_base_58_32, help = "Whitelist root, base-58 encoded.")]
        root: [u8; 32],

        #[arg(long, value_parser = parse_identity)]
        identity: Identity,

        #[arg(long, value_delimiter = ',', value_parser = parse_base_58_32, help = "Comma separated sibling digests, base-58 encoded.")]
        proof: Vec<[u8; 32]>,
    },
    CreateBallot {
        #[arg(long, value_delimiter = ',')]
        proposals: Vec<String>,

        #[arg(long, help = "Optional initial whitelist file")]
        whitelist_path: Option<PathBuf>,
    },
    AddWhitelist {
        #[arg(long, help = "Id of ballot")]
        ballot_id: u64,

        #[arg(long, help = "File with one base-58 identity per line")]
        whitelist_path: PathBuf,
    },
    FetchProof {
        #[arg(long, help = "Id of ballot")]
        ballot_id: u64,

        #[arg(long, value_parser = parse_identity)]
        identity: Identity,
    },
    Log {
        #[arg(long, help = "Id of ballot to fetch")]
        ballot_id: u64,
    },
}

fn main() -> Result<()> {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(false)
        .try_init();

    let runtime = Builder::new_multi_thread().enable_all().build()?;
    let cli = Cli::parse();

    match cli.command.clone() {
        // === Offline snapshot commands ===
        Commands::BuildSnapshot {
            ballot_id,
            whitelist_path,
            save_path,
            is_compressed,
        } => {
            let identities = read_identity_list(&whitelist_path)?;
            info!("Read {} identities from {:?}", identities.len(), whitelist_path);

            let snapshot = WhitelistSnapshot::build(ballot_id, identities)?;
            if is_compressed {
                snapshot.save_compressed(save_path.clone())?;
            } else {
                snapshot.save(save_path.clone())?;
            }

            info!("== Whitelist Snapshot For Ballot {} ==", ballot_id);
            info!("Merkle Root: {}", encode_digest(&snapshot.root));
            info!("Entries: {}", snapshot.entries.len());
            info!("Saved to {:?}", save_path);
        }
        Commands::LogSnapshotRoot {
            read_path,
            is_compressed,
        } => {
            let bytes = std::fs::read(&read_path)?;
            let (snapshot, hash) = WhitelistSnapshot::read_from_bytes_with_hash(bytes, is_compressed)?;
            if !snapshot.verify_integrity() {
                warn!("Snapshot proofs do not match its root");
            }
            info!("Ballot: {}", snapshot.ballot_id);
            info!("Merkle Root: {}", encode_digest(&snapshot.root));
            info!("Snapshot Hash: {}", encode_digest(&hash));
            info!("Entries: {}", snapshot.entries.len());
        }
        Commands::GetProof {
            read_path,
            identity,
            is_compressed,
        } => {
            let snapshot = WhitelistSnapshot::read(read_path, is_compressed)?;
            let proof = snapshot
                .proof_for(&identity)
                .ok_or_else(|| anyhow!("{} is not in the snapshot whitelist", identity))?;
            println!(
                "{}",
                json!({
                    "ballot_id": snapshot.ballot_id,
                    "identity": identity,
                    "merkle_root": encode_digest(&snapshot.root),
                    "proof": encode_proof(proof),
                })
            );
        }
        Commands::VerifyProof {
            root,
            identity,
            proof,
        } => {
            if MerkleAccumulator::verify(identity_leaf(&identity), &proof, &root) {
                info!("Proof is valid for {}", identity);
            } else {
                bail!("Proof does not verify against {}", encode_digest(&root));
            }
        }

        // === Proof service commands ===
        Commands::CreateBallot {
            proposals,
            whitelist_path,
        } => {
            let identities = match whitelist_path {
                Some(path) => read_identity_list(&path)?,
                None => Vec::new(),
            };
            let body = json!({
                "proposals": proposals,
                "identities": identities,
            });
            let url = format!("{}/ballots", cli.service_url);
            let resp = runtime.block_on(post_json(&url, cli.operator_token.as_deref(), body))?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Commands::AddWhitelist {
            ballot_id,
            whitelist_path,
        } => {
            let identities = read_identity_list(&whitelist_path)?;
            info!("Adding {} identities to ballot {}", identities.len(), ballot_id);
            let url = format!("{}/ballots/{}/whitelist", cli.service_url, ballot_id);
            let body = json!({ "identities": identities });
            let resp = runtime.block_on(post_json(&url, cli.operator_token.as_deref(), body))?;
            if resp["sync_status"] != "confirmed" {
                warn!(
                    "Root not yet confirmed on the ledger (status {}); proofs may be rejected until it is",
                    resp["sync_status"]
                );
            }
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Commands::FetchProof {
            ballot_id,
            identity,
        } => {
            let url = format!(
                "{}/ballots/{}/proof/{}",
                cli.service_url, ballot_id, identity
            );
            let resp = runtime.block_on(get_json(&url))?;
            if resp["is_whitelisted"] == true {
                let root = decode_digest(&resp["merkle_root"])?;
                let proof = resp["proof"]
                    .as_array()
                    .ok_or_else(|| anyhow!("missing proof"))?
                    .iter()
                    .map(decode_digest)
                    .collect::<Result<Vec<_>>>()?;
                if !MerkleAccumulator::verify(identity_leaf(&identity), &proof, &root) {
                    warn!("Service returned a proof that does not verify locally");
                }
            }
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Commands::Log { ballot_id } => {
            let url = format!("{}/ballots/{}", cli.service_url, ballot_id);
            let resp = runtime.block_on(get_json(&url))?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
    }

    Ok(())
}

fn encode_proof(proof: &[Digest]) -> Vec<String> {
    proof.iter().map(encode_digest).collect()
}

fn decode_digest(value: &Value) -> Result<Digest> {
    let s = value.as_str().ok_or_else(|| anyhow!("expected string digest"))?;
    parse_base_58_32(s).map_err(|e| anyhow!(e))
}

async fn get_json(url: &str) -> Result<Value> {
    let resp = reqwest::get(url)
        .await
        .with_context(|| format!("GET {}", url))?;
    let status = resp.status();
    if !status.is_success() {
        bail!("GET {} failed with status {}", url, status);
    }
    Ok(resp.json().await?)
}

async fn post_json(url: &str, token: Option<&str>, body: Value) -> Result<Value> {
    let client = reqwest::Client::new();
    let mut req = client.post(url).json(&body);
    if let Some(token) = token {
        req = req.bearer_auth(token);
    }
    let resp = req.send().await.with_context(|| format!("POST {}", url))?;
    let status = resp.status();
    if !status.is_success() {
        bail!("POST {} failed with status {}", url, status);
    }
    Ok(resp.json().await?)
}
