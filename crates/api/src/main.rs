//! API server entry point.

use std::sync::Arc;

use api::{AppState, Config, InMemoryBackends};
use event_bus::{DaprEventPublisher, InMemoryEventBus};
use saga::HttpAvailabilityChecker;
use state_store::{PostgresStateStore, StateStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn connect_store(config: &Config) -> Option<Arc<dyn StateStore>> {
    let url = config.database_url.as_deref()?;
    let store = PostgresStateStore::connect(url)
        .await
        .expect("failed to connect to Postgres");
    store
        .run_migrations()
        .await
        .expect("failed to run state store migrations");
    tracing::info!("using Postgres state store");
    Some(Arc::new(store))
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick backends
    // Nothing reads the publish log in a running server.
    let backends = InMemoryBackends {
        bus: InMemoryEventBus::with_log_capacity(0),
        ..InMemoryBackends::new()
    };
    let store = match connect_store(&config).await {
        Some(store) => store,
        None => {
            tracing::warn!("DATABASE_URL not set, state is kept in memory");
            Arc::new(backends.store.clone())
        }
    };

    let state = match &config.dapr_http_endpoint {
        Some(endpoint) => {
            tracing::info!(%endpoint, "publishing and checking inventory through the sidecar");
            let inventory_url = format!("{endpoint}/v1.0/invoke/inventory-service/method");
            Arc::new(AppState::new(
                store,
                Arc::new(HttpAvailabilityChecker::with_timeout(
                    inventory_url,
                    config.availability_timeout,
                )),
                Arc::new(DaprEventPublisher::new(endpoint.clone())),
                &config,
            ))
        }
        None => {
            tracing::info!("no sidecar configured, using the in-process bus");
            let state = Arc::new(AppState::new(
                store,
                Arc::new(backends.inventory.clone()),
                Arc::new(backends.bus.clone()),
                &config,
            ));
            state
                .dispatcher
                .clone()
                .start(&backends.bus)
                .await
                .expect("failed to subscribe the notification dispatcher");
            state
        }
    };

    // 4. Build the application
    let app = api::create_app(state, metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
