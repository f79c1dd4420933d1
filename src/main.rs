//! Meshcache node
//!
//! Runs one cache node hosting the demo "scores" group.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meshcache::api::{create_api_router, create_peer_router};
use meshcache::{AppState, CacheError, Config, Group, HttpPool, Registry, Result};

/// Main entry point for a cache node.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the "scores" group backed by a slow in-memory database
/// 4. Register the HTTP peer pool with the group
/// 5. Start the front-end API server when `API_ADDR` is set
/// 6. Serve the peer endpoint on `SELF_ADDR`
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meshcache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: self={}, peers={:?}, cache_bytes={}, replicas={}",
        config.self_addr, config.peer_addrs, config.cache_bytes, config.replicas
    );

    let registry = Arc::new(Registry::new());
    let mut group = Group::new("scores", config.cache_bytes, slow_db());
    if let Some(timeout) = config.load_timeout {
        group = group.with_load_timeout(timeout);
    }
    let group = registry.register(group)?;

    let pool = HttpPool::new(config.self_addr.clone())
        .with_base_path(config.base_path.clone())
        .with_replicas(config.replicas);
    pool.set(&config.peer_addrs);
    group.register_peers(Arc::new(pool))?;

    let state = AppState::new(Arc::clone(&registry), group.name());

    if let Some(api_addr) = config.api_addr.clone() {
        let app = create_api_router(state.clone());
        let listener = tokio::net::TcpListener::bind(api_addr.as_str()).await?;
        info!("Front-end server listening on http://{}", api_addr);
        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                tracing::error!("Front-end server failed: {}", err);
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(config.listen_addr()).await?;
    info!("Cache node running at {}", config.self_addr);

    axum::serve(listener, create_peer_router(state, &config.base_path))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Data source for the demo group; logs every lookup so cache hits are visible.
fn slow_db() -> impl Fn(&str) -> Result<Vec<u8>> + Send + Sync {
    let db: HashMap<&str, &str> = HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")]);
    move |key: &str| {
        info!("[SlowDB] search key {}", key);
        db.get(key)
            .map(|v| v.as_bytes().to_vec())
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
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
