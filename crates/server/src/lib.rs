//! `server`
//!
//! HTTP frontend of Libris. Opens the store, runs the startup id reconciliation and serves the
//! lending API until interrupted.
pub mod config;
pub mod errors;
pub mod routes;
pub mod state;

use anyhow::Context as _;
use config::Config;
use libris_core::Library;
use libris_core::database::Db;
use state::AppState;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. The filter is read from `RUST_LOG` and defaults to
/// `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Runs the server until ctrl-c is received.
/// # Errors
/// Fails if the store cannot be opened or reconciled, or if the listener cannot be bound.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let db = Db::init(&config.database)
        .await
        .with_context(|| format!("failed to open database at {}", config.database.display()))?;
    let (library, reports) = Library::start(db.pool().clone())
        .await
        .context("id reconciliation failed, refusing to serve")?;
    let backfilled: usize = reports.iter().map(|report| report.backfilled).sum();
    tracing::info!(backfilled, "id reconciliation complete");

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, routes::router(AppState::new(library)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    db.close().await;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
}
