//! Gridcache node - a partitioned, replicated in-memory cache server
//!
//! Serves the cache over HTTP and writes through to the configured store.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gridcache::api::{create_router, AppState};
use gridcache::tasks::{spawn_cleanup_task, spawn_event_logger, spawn_sweep_task};
use gridcache::{store, Config, Coordinator};

/// Main entry point for a gridcache node.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Open the persistent store and start the coordinator
/// 4. Start background cleanup, sweep and event tasks
/// 5. Serve the HTTP API until SIGINT/SIGTERM
/// 6. Drain pending write-through before exiting
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridcache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting gridcache node");

    let config = Config::from_env().context("invalid configuration")?;
    config.validate().context("invalid configuration")?;
    info!(
        "Configuration loaded: node={}, max_entries={}, default_ttl={}s, port={}, partitions={}, replication_factor={}, write_quorum={}, store={:?}",
        config.node_id,
        config.max_entries,
        config.default_ttl,
        config.server_port,
        config.partition_count,
        config.replication_factor,
        config.write_quorum,
        config.store_backend
    );

    let store = store::from_config(&config).context("failed to open persistent store")?;
    let coordinator = Coordinator::start(&config, store)
        .await
        .context("failed to start coordinator")?;
    if let Err(e) = coordinator.ping_store().await {
        warn!("Persistent store not reachable at startup: {}", e);
    }

    let background = vec![
        spawn_cleanup_task(coordinator.clone(), config.cleanup_interval),
        spawn_sweep_task(coordinator.clone(), config.sweep_interval),
        spawn_event_logger(coordinator.clone()),
    ];
    info!("Background tasks started");

    let app = create_router(AppState::new(coordinator.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    for handle in background {
        handle.abort();
    }
    warn!("Background tasks aborted");

    coordinator.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
