//! roomcast-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use roomcast_gateway::api;
use roomcast_gateway::app_state::AppState;
use roomcast_gateway::config::{GatewayConfig, LogFormat, PresenceBackend};
use roomcast_gateway::domain::{Clock, SystemClock};
use roomcast_gateway::service::RelayService;
use roomcast_gateway::store::{MemoryPresenceStore, PostgresPresenceStore, PresenceStore};
use roomcast_gateway::transport::{ChannelHub, ChannelSource, PostgresTransport, Transport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    tracing::info!(
        addr = %config.listen_addr,
        backend = %config.presence_backend,
        "starting roomcast-gateway"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let hub = Arc::new(ChannelHub::with_expiry(
        config.channel_capacity,
        config.presence_ttl(),
        Arc::clone(&clock),
    ));

    // Build storage and transport layer
    let (store, transport, channels): (
        Arc<dyn PresenceStore>,
        Arc<dyn Transport>,
        Arc<dyn ChannelSource>,
    ) = match config.presence_backend {
        PresenceBackend::Memory => (
            Arc::new(MemoryPresenceStore::new()) as Arc<dyn PresenceStore>,
            Arc::clone(&hub) as Arc<dyn Transport>,
            hub as Arc<dyn ChannelSource>,
        ),
        PresenceBackend::Postgres => {
            let store = PostgresPresenceStore::connect(&config).await?;
            let shared = Arc::new(PostgresTransport::start(store.pool().clone(), hub).await?);
            (
                Arc::new(store) as Arc<dyn PresenceStore>,
                Arc::clone(&shared) as Arc<dyn Transport>,
                shared as Arc<dyn ChannelSource>,
            )
        }
    };

    // Build service layer
    let relay = Arc::new(RelayService::new(
        store,
        transport,
        clock,
        config.registrar_policy(),
    ));

    let app_state = AppState {
        relay,
        channels,
        presence_backend: config.presence_backend,
    };
    let app = api::build_app(app_state, Duration::from_secs(config.request_timeout_secs));

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
