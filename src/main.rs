//! Tidecache - expiring in-memory cache server
//!
//! Serves a key/value cache and a file content cache over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tidecache::api::{create_router, AppState};
use tidecache::cache::loader;
use tidecache::config::Config;
use tidecache::tasks::{spawn_sweep_task, SweepConfig, SweepTarget};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create both caches, optionally preloading the file root
/// 4. Start background expiry sweep
/// 5. Serve HTTP until SIGINT/SIGTERM, then stop the sweep and exit
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tidecache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tidecache server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: default_ttl={}s, file_root={:?}, file_ttl={}s, port={}, sweep_interval={}ms",
        config.default_ttl,
        config.file_root,
        config.file_ttl,
        config.server_port,
        config.sweep_interval_ms
    );

    let state = AppState::from_config(&config);

    if let (true, Some(root)) = (config.preload_files, config.file_root.clone()) {
        let files = Arc::clone(&state.files);
        let ttl = config.file_cache_ttl();
        let loaded = tokio::task::spawn_blocking(move || loader::insert_dir(&*files, &root, ".", ttl))
            .await
            .context("preload task failed")?
            .context("failed to preload file root")?;
        info!("Preloaded {} files", loaded);
    }

    let sweeper = spawn_sweep_task(
        vec![
            SweepTarget::new("kv", state.kv.clone()),
            SweepTarget::new("files", state.files.clone()),
        ],
        SweepConfig {
            interval: config.sweep_interval(),
            lock_timeout: config.sweep_lock_timeout(),
        },
    );

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
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
