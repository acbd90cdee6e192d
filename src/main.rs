//! Refcache - diagnostics server for a locale-aware reference-data cache
//!
//! Serves a named-value cache backed by per-locale JSON files.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use refcache::api::create_router;
use refcache::payload::NamedValueDto;
use refcache::{AcceptAll, AppState, Config, FileDataSource, NamedValueCache};

/// Main entry point for the refcache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache (arms the refresh timer and the expiry sweep)
/// 4. Create Axum router with all endpoints
/// 5. Start HTTP server on configured port
/// 6. Dispose the cache on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refcache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting refcache server");

    // Load configuration from environment variables
    let config = Config::from_env().context("invalid configuration")?;
    info!(
        "Configuration loaded: cache={}, locales={:?}, strategy={}, port={}, data={}",
        config.cache.name,
        config.cache.prefetch_locales,
        config.cache.strategy,
        config.server_port,
        config.data_dir.display()
    );

    let source: FileDataSource<NamedValueDto> =
        FileDataSource::new(config.data_dir.clone(), config.data_resource.clone());
    let cache = Arc::new(
        NamedValueCache::new(config.cache.clone(), Arc::new(source), Arc::new(AcceptAll))
            .context("failed to create cache")?,
    );
    info!("Cache initialized, first refresh in {:?}", config.cache.refresh_due);

    let app = create_router(AppState::new(Arc::clone(&cache)));

    // Bind to configured port
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    cache.dispose();
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
