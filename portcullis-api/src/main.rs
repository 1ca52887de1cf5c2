//! # Portcullis API Server
//!
//! Multi-tenant API backend enforcing authentication, tenant isolation,
//! and rate limiting on every request.
//!
//! ## Architecture
//!
//! The server is built with Axum and provides:
//! - Tenant registration and JWT session management (login, refresh, logout)
//! - Tenant-scoped user and file management
//! - Per-address and per-identity sliding-window rate limiting
//! - Admin endpoints for tenant inspection
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p portcullis-api
//! ```

use portcullis_api::{app, config::Config};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired rate windows and revocation records are swept.
const HOUSEKEEPING_INTERVAL: std::time::Duration = std::time::Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portcullis_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Portcullis API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    let bind_address = config.bind_address();
    let state = app::state_from_config(config).await?;

    // Both the rate limiter and the revocation list grow with traffic and
    // only shrink when swept.
    let limiter = Arc::clone(&state.limiter);
    let tokens = Arc::clone(&state.tokens);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        loop {
            ticker.tick().await;
            let dropped_windows = limiter.purge_idle(chrono::Duration::minutes(10));
            let dropped_revocations = tokens.purge_revocations();
            tracing::debug!(dropped_windows, dropped_revocations, "Housekeeping sweep");
        }
    });

    let router = app::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutdown signal received, exiting...");

    Ok(())
}

async fn shutdown_signal() {
    // If signal delivery itself fails there is nothing to wait for; falling
    // through would shut the server down immediately, so park instead.
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
