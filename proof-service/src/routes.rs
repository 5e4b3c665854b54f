//! HTTP boundary

use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::{
    extract::{Path, State},
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use ballot_cli::root_or_empty;
use ballot_registry::{ErrorCode, ErrorKind, Identity};
use serde_json::{json, Value};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::auth_middleware::auth_middleware;
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::ledger::LedgerError;
use crate::metrics;
use crate::middleware::inject_client_ip;
use crate::state::AppState;
use crate::sync::{SyncState, SyncStatus};
use crate::types::{
    parse_identities, BallotResponse, CountResponse, CreateBallotRequest, CreateBallotResponse,
    ProofResponse, WhitelistRequest, WhitelistResponse,
};

/// Seconds a client should wait before asking again for an unconfirmed root.
const RETRY_AFTER_SECS: &str = "1";

pub fn build_router(state: AppState) -> Router {
    let operator_routes = Router::new()
        .route("/ballots", post(create_ballot))
        .route("/ballots/{id}/whitelist", post(add_whitelist))
        .route("/ballots/{id}/sync/retry", post(retry_sync))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/healthz", get(health_check))
        .route("/version", get(get_version))
        .route("/metrics", get(get_metrics))
        .route("/ballots/{id}", get(get_ballot))
        .route("/ballots/{id}/whitelist/count", get(get_whitelist_count))
        .route("/ballots/{id}/proof/{identity}", get(get_proof))
        .route("/ballots/{id}/sync", get(get_sync))
        .merge(operator_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Per-client-IP rate limit. Needs `ConnectInfo<SocketAddr>` when no
/// forwarding header is present, so it is applied only around a served app.
pub fn with_rate_limit(router: Router, config: &ServiceConfig) -> Result<Router> {
    let replenish_ms = (1000 / config.rate_limit_per_second).max(1);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(replenish_ms)
            .burst_size(config.rate_limit_burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow!("invalid rate limit configuration"))?,
    );

    Ok(router
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(middleware::from_fn(inject_client_ip)))
}

async fn health_check() -> &'static str {
    "ok"
}

async fn get_version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "git_hash": option_env!("PROOF_SERVICE_BUILD_GIT_HASH"),
        "build_time_unix": env!("PROOF_SERVICE_BUILD_TIME_UNIX"),
    }))
}

async fn get_metrics(State(app_state): State<AppState>) -> Json<Value> {
    Json(metrics::snapshot_as_json(&app_state.db_path))
}

async fn create_ballot(
    State(app_state): State<AppState>,
    Json(req): Json<CreateBallotRequest>,
) -> Result<Response, StatusCode> {
    info!(
        "POST /ballots - {} proposals, {} identities",
        req.proposals.len(),
        req.identities.len()
    );

    let identities = parse_identities(&req.identities).map_err(|e| {
        info!("Invalid identity: {}", e);
        StatusCode::BAD_REQUEST
    })?;
    let root = root_or_empty(identities.iter().copied());

    let ballot_id = app_state
        .ledger
        .create_ballot(root, req.proposals)
        .map_err(|e| {
            info!("Ballot creation rejected: {}", e);
            ledger_status(&e)
        })?;

    let seeded = app_state
        .proof_service
        .seed_whitelist(ballot_id, &identities)
        .await
        .map_err(|e| service_status("Seeding whitelist", &e))?;

    let (merkle_root, addresses, sync_status) = match seeded {
        Some(update) => {
            let sync = settle(&app_state, ballot_id, update.sync).await;
            (update.merkle_root, update.addresses, sync.status)
        }
        None => (root, 0, SyncStatus::Confirmed),
    };

    info!("Created ballot {}", ballot_id);
    Ok((
        StatusCode::CREATED,
        Json(CreateBallotResponse {
            ballot_id,
            merkle_root,
            addresses,
            sync_status,
        }),
    )
        .into_response())
}

async fn get_ballot(
    State(app_state): State<AppState>,
    Path(ballot_id): Path<u64>,
) -> Result<Json<BallotResponse>, StatusCode> {
    let ballot = app_state
        .ledger
        .ballot(ballot_id)
        .map_err(|e| ledger_status(&e))?;
    let service = &app_state.proof_service;

    Ok(Json(BallotResponse::new(
        &ballot,
        service.addresses(ballot_id),
        service.sync_state(ballot_id),
    )))
}

async fn add_whitelist(
    State(app_state): State<AppState>,
    Path(ballot_id): Path<u64>,
    Json(req): Json<WhitelistRequest>,
) -> Result<Response, StatusCode> {
    info!(
        "POST /ballots/{}/whitelist - {} identities",
        ballot_id,
        req.identities.len()
    );

    let identities = parse_identities(&req.identities).map_err(|e| {
        info!("Invalid identity: {}", e);
        StatusCode::BAD_REQUEST
    })?;
    ensure_ballot(&app_state, ballot_id)?;

    let update = app_state
        .proof_service
        .add_to_whitelist(ballot_id, &identities)
        .await
        .map_err(|e| service_status("Whitelist update", &e))?;
    let sync = settle(&app_state, ballot_id, update.sync).await;

    let status = match sync.status {
        SyncStatus::Confirmed => StatusCode::OK,
        SyncStatus::Pending => StatusCode::ACCEPTED,
        SyncStatus::Failed => StatusCode::BAD_GATEWAY,
    };
    Ok((
        status,
        Json(WhitelistResponse {
            ballot_id,
            merkle_root: update.merkle_root,
            addresses: update.addresses,
            added: update.added,
            sync_status: sync.status,
            sync,
        }),
    )
        .into_response())
}

async fn get_whitelist_count(
    State(app_state): State<AppState>,
    Path(ballot_id): Path<u64>,
) -> Result<Json<CountResponse>, StatusCode> {
    ensure_ballot(&app_state, ballot_id)?;
    Ok(Json(CountResponse {
        ballot_id,
        addresses: app_state.proof_service.addresses(ballot_id),
    }))
}

async fn get_proof(
    State(app_state): State<AppState>,
    Path((ballot_id, identity)): Path<(u64, String)>,
) -> Result<Response, StatusCode> {
    info!("GET /ballots/{}/proof/{}", ballot_id, identity);

    let identity = identity.parse::<Identity>().map_err(|e| {
        info!("Invalid identity {}: {}", identity, e);
        StatusCode::BAD_REQUEST
    })?;
    ensure_ballot(&app_state, ballot_id)?;

    let result = app_state.proof_service.generate_proof(ballot_id, &identity);
    let confirmed = result.sync_status == SyncStatus::Confirmed;

    let mut response = Json(ProofResponse::from(result)).into_response();
    if !confirmed {
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
    }
    Ok(response)
}

async fn get_sync(
    State(app_state): State<AppState>,
    Path(ballot_id): Path<u64>,
) -> Result<Json<SyncState>, StatusCode> {
    ensure_ballot(&app_state, ballot_id)?;
    app_state
        .proof_service
        .sync_state(ballot_id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn retry_sync(
    State(app_state): State<AppState>,
    Path(ballot_id): Path<u64>,
) -> Result<(StatusCode, Json<SyncState>), StatusCode> {
    info!("POST /ballots/{}/sync/retry", ballot_id);
    ensure_ballot(&app_state, ballot_id)?;

    let state = app_state
        .proof_service
        .retry_push(ballot_id)
        .await
        .map_err(|e| service_status("Push retry", &e))?;
    Ok((StatusCode::ACCEPTED, Json(state)))
}

/// Wait up to the configured time for a pending root to settle.
async fn settle(app_state: &AppState, ballot_id: u64, sync: SyncState) -> SyncState {
    if sync.status != SyncStatus::Pending {
        return sync;
    }
    app_state
        .proof_service
        .wait_for_sync(ballot_id, app_state.sync_wait)
        .await
        .unwrap_or(sync)
}

fn ensure_ballot(app_state: &AppState, ballot_id: u64) -> Result<(), StatusCode> {
    app_state
        .ledger
        .view(|registry| registry.get_ballot(ballot_id).map(|_| ()))
        .map_err(|e| ledger_status(&e))
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::Rejected(ErrorCode::UnknownBallot) => StatusCode::NOT_FOUND,
        LedgerError::Rejected(code) => match code.kind() {
            ErrorKind::Validation | ErrorKind::Proof => StatusCode::BAD_REQUEST,
            ErrorKind::State => StatusCode::CONFLICT,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
        },
        LedgerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn service_status(action: &str, err: &ServiceError) -> StatusCode {
    info!("{} failed: {}", action, err);
    match err {
        ServiceError::EmptyBatch | ServiceError::BallotIdOutOfRange(_) => StatusCode::BAD_REQUEST,
        ServiceError::NoSyncState(_) => StatusCode::NOT_FOUND,
        ServiceError::NothingToRetry(_) | ServiceError::BallotIdReused(_) => StatusCode::CONFLICT,
        ServiceError::RootPushPending(_) => StatusCode::ACCEPTED,
        ServiceError::Database(_) if err.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Database(_)
        | ServiceError::Merkle(_)
        | ServiceError::CorruptEntry(_)
        | ServiceError::InvalidDbPath(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
