//! Governance Dashboard API
//!
//! Off-chain registry for proposals of a Governor/Timelock DAO. Proposals
//! are recorded as drafts keyed by the id the Governor will assign, sent
//! on-chain with `propose`, and marked published once the transaction is
//! confirmed.

mod auth;
mod chain;
mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod state;
mod store;
mod submission;

use crate::chain::{ensure_timelock_roles, GovernanceChain, JsonRpcClient, RpcGovernance};
use crate::config::{LogFormat, Settings};
use crate::db::{PgProposalStore, PgUserStore};
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(settings.log_format);

    info!("Starting Governance Dashboard API...");

    let pool = db::create_pool(&settings.database).await?;
    db::init_schema(&pool).await?;

    let rpc = JsonRpcClient::new(settings.chain.rpc_url.clone(), settings.chain.rpc_timeout)?;
    match rpc.chain_id().await {
        Ok(chain_id) => info!(chain_id, rpc_url = %settings.chain.rpc_url, "connected to chain"),
        Err(e) => warn!(rpc_url = %settings.chain.rpc_url, "chain not reachable yet: {}", e),
    }
    let contracts = settings.chain.contracts;
    info!(
        governor = %contracts.governor,
        token = %contracts.token,
        timelock = %contracts.timelock,
        "governance contracts"
    );

    let chain: Arc<dyn GovernanceChain> = Arc::new(RpcGovernance::new(
        rpc,
        contracts,
        settings.chain.receipt_poll_interval,
        settings.chain.receipt_max_polls,
    ));

    if settings.chain.grant_timelock_roles {
        if let Some(admin) = settings.chain.admin_address {
            match ensure_timelock_roles(chain.as_ref(), admin).await {
                Ok(granted) if granted.is_empty() => info!("timelock roles already in place"),
                Ok(granted) => info!(roles = ?granted, "timelock roles granted"),
                Err(e) => error!("failed to grant timelock roles: {}", e),
            }
        }
    }

    let state = Arc::new(AppState::new(
        Arc::new(PgUserStore::new(pool.clone())),
        Arc::new(PgProposalStore::new(pool)),
        chain,
        settings.clone(),
    ));

    let app = create_router(state, &settings);
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("Server listening on http://{}", addr);
    info!("API Endpoints:");
    info!("   GET    /api/health");
    info!("   GET    /api/users                        - List users");
    info!("   POST   /api/users/auth                   - Sign in with a wallet signature");
    info!("   GET    /api/proposals                    - List proposals");
    info!("   GET    /api/proposals/stats              - Proposal statistics");
    info!("   POST   /api/proposals/submit             - Submit a proposal on-chain");
    info!("   POST   /api/proposals/{{id}}/submit        - Retry an unpublished draft");
    info!("   GET    /api/governance/proposals         - On-chain proposals");
    info!("   POST   /api/governance/proposals/{{id}}/vote - Cast a vote");
    info!("   POST   /api/governance/delegate          - Self-delegate voting power");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,governance_api=debug,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_file(true)
                    .with_line_number(true)
                    .compact(),
            )
            .init(),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received terminate signal, shutting down..."),
    }
}
