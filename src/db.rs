//! Database connection management
//!
//! Builds the connection pool, creates the schema and ensures the
//! well-known roles and the permission catalog exist.

#[cfg(test)]
pub mod memory;
mod postgres;
pub mod queries;

pub use postgres::PgStore;

use crate::auth::{catalog, ADMIN_ROLE, DEFAULT_ROLE};
use crate::config::DatabaseConfig;
use crate::error::AppError;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::{debug, info};
use uuid::Uuid;

/// Create a connection pool and verify it can reach the server
pub async fn create_pool(config: &DatabaseConfig) -> Result<Pool, AppError> {
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
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
    }
    .map_err(|e| AppError::Config(format!("Failed to create pool: {}", e)))?;

    // Test connection
    let client = pool.get().await?;
    client.query_one("SELECT 1", &[]).await?;
    drop(client);

    info!(
        "Database pool established ({}:{}/{}, TLS: {})",
        config.host, config.port, config.database, config.require_tls
    );
    Ok(pool)
}

/// Create tables and indexes if they don't exist
pub async fn init_schema(pool: &Pool) -> Result<(), AppError> {
    let client = pool.get().await?;

    for statement in [
        queries::CREATE_ROLES,
        queries::CREATE_PERMISSIONS,
        queries::CREATE_ROLE_PERMISSIONS,
        queries::CREATE_USERS,
    ] {
        client.execute(statement, &[]).await?;
    }
    for statement in queries::CREATE_INDEXES {
        client.execute(*statement, &[]).await?;
    }

    info!("✅ Database tables initialized");
    Ok(())
}

/// Idempotently insert the default roles and the permission catalog
pub async fn ensure_defaults(pool: &Pool) -> Result<(), AppError> {
    let client = pool.get().await?;

    let roles = [
        (DEFAULT_ROLE, "Default role for new users"),
        (ADMIN_ROLE, "System administrator"),
    ];
    for (name, description) in roles {
        let inserted = client
            .execute(queries::ENSURE_ROLE, &[&Uuid::new_v4(), &name, &description])
            .await?;
        if inserted > 0 {
            info!("Created role {}", name);
        }
    }

    for (name, description) in catalog::ALL {
        client
            .execute(
                queries::ENSURE_PERMISSION,
                &[&Uuid::new_v4(), name, description],
            )
            .await?;
    }
    debug!("Permission catalog ensured ({} entries)", catalog::ALL.len());

    Ok(())
}
