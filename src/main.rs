//! ERP Admin API
//!
//! Administrative backend for users, roles and permissions. Callers sign in
//! with email and password, receive a JWT, and every other endpoint checks
//! the caller's role against the permissions the route declares.

mod auth;
mod config;
mod db;
mod error;
mod models;
mod permissions;
mod repository;
mod roles;
mod routes;
mod state;
mod users;

use crate::config::Settings;
use crate::db::PgStore;
use crate::repository::Repositories;
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting ERP Admin API...");

    // Load configuration; JWT settings are mandatory
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    let pool = db::create_pool(&settings.database).await?;
    db::init_schema(&pool).await?;
    db::ensure_defaults(&pool).await?;

    let repos = Repositories::from_store(Arc::new(PgStore::new(pool)));
    let state = Arc::new(AppState::new(repos, &settings.jwt, &settings.auth)?);

    if let Some((email, password)) = settings.bootstrap.admin_credentials() {
        state.users.ensure_admin(email, password).await?;
    }

    if settings.auth.permission_cache_ttl.is_zero() {
        info!("Permission cache disabled");
    } else {
        info!(
            "Permission cache enabled (ttl {}s)",
            settings.auth.permission_cache_ttl.as_secs()
        );
    }

    // Build the router
    let app = create_router(state, &settings.cors);

    let addr = SocketAddr::from((settings.server.host, settings.server.port));
    info!("🌐 Server listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,erp_admin_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
