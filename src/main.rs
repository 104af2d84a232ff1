//! collab-relay server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use collab_relay::app_state::AppState;
use collab_relay::config::RelayConfig;
use collab_relay::domain::SessionStore;
use collab_relay::server;
use collab_relay::service::SessionService;
use collab_relay::ws::registry::ConnectionRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = RelayConfig::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    tracing::info!(addr = %config.listen_addr, "starting collab-relay");

    // Build domain and service layers
    let store = Arc::new(SessionStore::new());
    let registry = Arc::new(ConnectionRegistry::new());
    let service = Arc::new(SessionService::new(store, registry));

    // Optional idle-session eviction
    if config.session_ttl_secs > 0 {
        let sweeper = Arc::clone(&service);
        let ttl = Duration::from_secs(config.session_ttl_secs);
        let mut interval =
            tokio::time::interval(Duration::from_secs(config.session_sweep_interval_secs.max(1)));
        tokio::spawn(async move {
            loop {
                interval.tick().await;
                let removed = sweeper.evict_idle(ttl).await;
                if removed > 0 {
                    tracing::info!(removed, "idle session sweep");
                }
            }
        });
    }

    // Build application state and router
    let app = server::app(AppState { service });

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
