use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use proof_service::database::constants::DEFAULT_DB_PATH;
use proof_service::utils::{env_opt, env_parse};
use rand::{seq::SliceRandom, thread_rng};
use reqwest::Client;
use sqlx::SqlitePool;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::{interval, MissedTickBehavior};

const LABELS: [&str; 3] = ["proof", "count", "ballot"];

/// (success, latency ms, label index)
type Sample = (bool, u128, usize);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url = env_opt("BASE_URL").unwrap_or_else(|| "http://localhost:3000".to_string());
    let db_path = env_opt("DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
    let ballot_id: u64 = env_parse("BALLOT_ID", 0);
    let duration_secs: u64 = env_parse("DURATION_SECS", 30);
    let concurrency: usize = env_parse("CONCURRENCY", 64);
    let target_rps: Option<u64> = env_opt("TARGET_RPS")
        .and_then(|v| v.parse().ok())
        .filter(|&n| n > 0);

    // Weights like "proof=8,count=1,ballot=1"; unlisted endpoints get 1.
    let weights = env_opt("ENDPOINT_WEIGHTS").unwrap_or_default();
    let mut pick_bag: Vec<usize> = Vec::new();
    for (idx, label) in LABELS.iter().enumerate() {
        let weight = weights
            .split(',')
            .filter_map(|kv| kv.split_once('='))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(label))
            .and_then(|(_, v)| v.trim().parse::<u32>().ok())
            .unwrap_or(1);
        pick_bag.extend(std::iter::repeat(idx).take(weight as usize));
    }
    if pick_bag.is_empty() {
        anyhow::bail!("ENDPOINT_WEIGHTS disabled every endpoint");
    }

    println!("BASE_URL={} DB_PATH={} BALLOT_ID={}", base_url, db_path, ballot_id);
    println!(
        "DURATION_SECS={} CONCURRENCY={} {}",
        duration_secs,
        concurrency,
        target_rps
            .map(|r| format!("TARGET_RPS={}", r))
            .unwrap_or_else(|| "(best-effort firehose)".to_string())
    );

    // Sample identities straight from the whitelist store
    let pool = SqlitePool::connect(&format!("sqlite:{}", db_path)).await?;
    let identities: Vec<String> = sqlx::query_scalar(
        "SELECT identity FROM whitelist_entries WHERE ballot_id = ? LIMIT 5000",
    )
    .bind(i64::try_from(ballot_id)?)
    .fetch_all(&pool)
    .await?;
    println!("Loaded {} identities", identities.len());
    if identities.is_empty() {
        anyhow::bail!("No whitelist entries for ballot {} in {}", ballot_id, db_path);
    }

    let client = Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(10_000)
        .tcp_nodelay(true)
        .timeout(Duration::from_secs(15))
        .build()?;

    let start_at = Instant::now();
    let end_at = start_at + Duration::from_secs(duration_secs);
    let sem = Arc::new(Semaphore::new(concurrency));
    let issued = Arc::new(AtomicU64::new(0));
    let (tx, rx) = mpsc::unbounded_channel::<Sample>();
    let stats_handle = tokio::spawn(report(rx, start_at, issued.clone()));

    let mut ticker = target_rps.map(|rps| {
        let mut t = interval(Duration::from_nanos(1_000_000_000 / rps));
        t.set_missed_tick_behavior(MissedTickBehavior::Delay);
        t
    });
    let mut rng = thread_rng();
    let mut tasks = Vec::new();

    while Instant::now() < end_at {
        if let Some(t) = ticker.as_mut() {
            t.tick().await;
        }
        let permit = sem.clone().acquire_owned().await?;
        issued.fetch_add(1, Ordering::Relaxed);

        let Some(&idx) = pick_bag.choose(&mut rng) else {
            break;
        };
        let url = match LABELS[idx] {
            "proof" => {
                let Some(identity) = identities.choose(&mut rng) else {
                    break;
                };
                format!("{}/ballots/{}/proof/{}", base_url, ballot_id, identity)
            }
            "count" => format!("{}/ballots/{}/whitelist/count", base_url, ballot_id),
            _ => format!("{}/ballots/{}", base_url, ballot_id),
        };

        let client = client.clone();
        let tx = tx.clone();
        tasks.push(tokio::spawn(async move {
            let started = Instant::now();
            let resp = client.get(&url).send().await;
            let elapsed = started.elapsed().as_millis();
            let ok = matches!(&resp, Ok(r) if r.status().is_success());
            let _ = tx.send((ok, elapsed, idx));
            drop(permit);
            if !ok {
                match resp {
                    Ok(r) => eprintln!("err {}ms {} status={}", elapsed, url, r.status()),
                    Err(e) => eprintln!("err {}ms {} net={}", elapsed, url, e),
                }
            }
        }));
    }

    // Close the stats channel so the summary prints
    drop(tx);
    for t in tasks {
        let _ = t.await;
    }
    let _ = stats_handle.await;

    Ok(())
}

async fn report(mut rx: mpsc::UnboundedReceiver<Sample>, start_at: Instant, issued: Arc<AtomicU64>) {
    let mut ok_per = [0u64; LABELS.len()];
    let mut err_per = [0u64; LABELS.len()];
    let mut latencies_ms: Vec<u128> = Vec::new();
    while let Some((success, ms, idx)) = rx.recv().await {
        if success {
            ok_per[idx] += 1;
        } else {
            err_per[idx] += 1;
        }
        latencies_ms.push(ms);
    }

    latencies_ms.sort_unstable();
    let p = |q: f64| -> u128 {
        if latencies_ms.is_empty() {
            return 0;
        }
        let idx = ((latencies_ms.len() as f64 - 1.0) * q).round() as usize;
        latencies_ms[idx]
    };
    let ok: u64 = ok_per.iter().sum();
    let err: u64 = err_per.iter().sum();
    let elapsed = start_at.elapsed().as_secs_f64();
    let qps = if elapsed > 0.0 {
        (ok + err) as f64 / elapsed
    } else {
        0.0
    };

    println!(
        "Summary: issued={} completed={} ok={} err={} p50={}ms p90={}ms p99={}ms qps={:.1}",
        issued.load(Ordering::Relaxed),
        ok + err,
        ok,
        err,
        p(0.50),
        p(0.90),
        p(0.99),
        qps
    );
    for (i, name) in LABELS.iter().enumerate() {
        println!(
            "  {}: ok={} err={} total={}",
            name,
            ok_per[i],
            err_per[i],
            ok_per[i] + err_per[i]
        );
    }
}
