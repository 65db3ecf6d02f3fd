//! balance-event-store server entry point.
//!
//! Loads configuration, opens the storage backend and serves the REST and
//! WebSocket endpoints until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use balance_event_store::api;
use balance_event_store::app_state::AppState;
use balance_event_store::config::{LogFormat, StorageBackend, StoreConfig};
use balance_event_store::domain::EventBus;
use balance_event_store::persistence::{EventStore, InMemoryEventStore, PostgresEventStore};
use balance_event_store::service::EventService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = StoreConfig::from_env().context("failed to load configuration")?;

    // Initialize tracing
    init_tracing(config.log_format);
    tracing::info!(
        addr = %config.listen_addr,
        backend = %config.backend,
        "starting balance-event-store"
    );

    // Open storage backend
    let store = open_store(&config).await?;

    // Build service layer
    let event_bus = EventBus::new(config.event_bus_capacity);
    let event_service = EventService::new(store, event_bus, config.operation_timeout());
    let app = api::build_app(AppState::new(event_service), config.request_timeout());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

async fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn EventStore>> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::warn!("using in-memory store; records are lost on restart");
            Ok(Arc::new(InMemoryEventStore::new()))
        }
        StorageBackend::Postgres => {
            let store = PostgresEventStore::connect(config)
                .await
                .context("failed to connect to postgres")?;
            if config.database_run_migrations {
                store.migrate().await.context("failed to apply migrations")?;
            }
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
