use std::net::SocketAddr;

use proof_service::{routes, AppState, ServiceConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Whitelisted Ballots Proof Service");

    let config = ServiceConfig::from_env()?;
    let (state, worker) = AppState::start(&config).await?;
    info!(
        "Proof service ready with {} ballot whitelist(s)",
        state.proof_service.ballot_ids().len()
    );

    let app = routes::with_rate_limit(routes::build_router(state), &config)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await;

    worker.abort();
    if let Err(e) = &served {
        error!("Server stopped: {}", e);
    }
    Ok(served?)
}
