//! cv-server: HTTP API, reconciliation scanner and byte streamer.
//!
//! This crate ties the store and the parser together into a running
//! server. It provides:
//!
//! - Axum-based JSON API for browsing, tagging and administering the catalog
//! - Range-aware streaming of the underlying video files
//! - The reconciliation scanner, run at startup, on demand and optionally
//!   on a fixed interval
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod router;
pub mod routes;
pub mod scanner;
pub mod streaming;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cv_core::config::Config;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;
use crate::scanner::Scanner;

/// Start the clipvault server.
///
/// Opens the database, constructs the [`AppContext`], kicks off the startup
/// and periodic scans and serves HTTP until a shutdown signal arrives.
pub async fn start(config: Config) -> cv_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let db_path = config.server.db_path.clone();
    let existed = db_path.exists();
    let db = cv_db::pool::init_pool(&db_path)?;
    if existed {
        tracing::info!("Database opened (existing) at {}", db_path.display());
    } else {
        tracing::info!("Database created (new) at {}", db_path.display());
    }

    let ctx = AppContext::new(db, config.clone());
    let cancel = CancellationToken::new();

    if config.library.scan_on_startup {
        let scanner = ctx.scanner.clone();
        tokio::spawn(async move {
            if let Err(e) = scanner.scan().await {
                tracing::error!(error = %e, "Startup scan failed");
            }
        });
    }

    let periodic_handle = match config.library.scan_interval_secs {
        Some(secs) if secs > 0 => {
            let scanner = ctx.scanner.clone();
            let cancel = cancel.clone();
            Some(tokio::spawn(run_periodic_scans(
                scanner,
                Duration::from_secs(secs),
                cancel,
            )))
        }
        _ => None,
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| cv_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let app = router::build_router(ctx, config.server.static_dir.clone());

    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| cv_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .map_err(|e| cv_core::Error::Internal(format!("Server error: {e}")))?;

    // Signal background tasks to stop.
    cancel.cancel();
    if let Some(handle) = periodic_handle {
        let _ = handle.await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Rescan every `interval` until cancelled. The first pass happens one
/// interval after startup.
async fn run_periodic_scans(scanner: Arc<Scanner>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Periodic scanning enabled");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = scanner.scan().await {
                    tracing::error!(error = %e, "Periodic scan failed");
                }
            }
            _ = cancel.cancelled() => break,
        }
    }

    tracing::debug!("Periodic scanner stopped");
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
