//! PostgreSQL access
//!
//! Connection pooling, schema bootstrap and the PostgreSQL implementations
//! of the store traits.

mod proposals;
pub mod queries;
mod users;

pub use proposals::PgProposalStore;
pub use users::PgUserStore;

use crate::config::DatabaseConfig;
use crate::error::{conflict_error, not_found_error, AppError};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::error::SqlState;
use tokio_postgres::NoTls;
use tracing::info;

/// Build the pool and verify that a connection can be opened
pub async fn create_pool(config: &DatabaseConfig) -> anyhow::Result<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.user = Some(config.user.clone());
    cfg.password = Some(config.password.clone());
    cfg.dbname = Some(config.database.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(config.max_pool_size));

    let pool = if config.require_tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
        cfg.create_pool(Some(Runtime::Tokio1), tls)
            .map_err(|e| anyhow::anyhow!("Failed to create TLS pool: {}", e))?
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| anyhow::anyhow!("Failed to create pool: {}", e))?
    };

    let client = pool
        .get()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get pool connection: {}", e))?;
    client
        .query_one("SELECT 1", &[])
        .await
        .map_err(|e| anyhow::anyhow!("Failed to verify database connection: {}", e))?;

    info!(
        host = %config.host,
        database = %config.database,
        tls = config.require_tls,
        "✅ Database connection successful"
    );
    Ok(pool)
}

/// Create tables and indexes if they don't exist
pub async fn init_schema(pool: &Pool) -> anyhow::Result<()> {
    let client = pool.get().await?;

    client.execute(queries::CREATE_USERS_TABLE, &[]).await?;
    client.execute(queries::CREATE_PROPOSALS_TABLE, &[]).await?;
    for statement in queries::CREATE_INDEXES {
        client.execute(statement, &[]).await?;
    }

    info!("✅ Database tables initialized");
    Ok(())
}

/// Translate constraint violations on proposal writes into API errors
fn map_proposal_write_error(e: tokio_postgres::Error) -> AppError {
    match e.code() {
        Some(code) if *code == SqlState::UNIQUE_VIOLATION => {
            conflict_error("Proposal with this onchain_id already exists")
        }
        Some(code) if *code == SqlState::FOREIGN_KEY_VIOLATION => not_found_error("User not found"),
        _ => AppError::Database(e),
    }
}
