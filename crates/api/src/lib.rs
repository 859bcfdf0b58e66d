//! HTTP API server for the order saga and notification dispatcher.
//!
//! Exposes the order service over REST, accepts pub/sub deliveries for the
//! dispatcher, and serves health and Prometheus metrics. Logging goes
//! through `tracing`.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use event_bus::{EventPublisher, InMemoryEventBus};
use metrics_exporter_prometheus::PrometheusHandle;
use notifications::{Channel, LoggingChannelSender, NotificationDispatcher, WebhookSender};
use saga::{AvailabilityChecker, InMemoryAvailabilityChecker, OrderSagaCoordinator};
use state_store::{InMemoryStateStore, StateStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::ApiError;

/// The coordinator as wired by the server, with every collaborator behind a
/// trait object so the backends can be picked at startup.
pub type Coordinator = OrderSagaCoordinator<
    Arc<dyn StateStore>,
    Arc<dyn AvailabilityChecker>,
    Arc<dyn EventPublisher>,
>;

pub type Dispatcher = NotificationDispatcher<Arc<dyn StateStore>>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub coordinator: Coordinator,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// Wires the coordinator and dispatcher over one state store.
    pub fn new(
        store: Arc<dyn StateStore>,
        availability: Arc<dyn AvailabilityChecker>,
        publisher: Arc<dyn EventPublisher>,
        config: &Config,
    ) -> Self {
        let coordinator = OrderSagaCoordinator::with_config(
            store.clone(),
            availability,
            publisher,
            config.saga_config(),
        );

        Self {
            coordinator,
            dispatcher: Arc::new(build_dispatcher(store, config)),
        }
    }
}

/// Builds the dispatcher with a sender for every channel.
///
/// Email, SMS and push are written to the log; webhooks are delivered over
/// HTTP.
pub fn build_dispatcher(store: Arc<dyn StateStore>, config: &Config) -> Dispatcher {
    NotificationDispatcher::new(store, config.dispatcher_config())
        .with_sender(LoggingChannelSender::new(Channel::Email))
        .with_sender(LoggingChannelSender::new(Channel::Sms))
        .with_sender(LoggingChannelSender::new(Channel::Push))
        .with_sender(WebhookSender::with_timeout(config.notification_send_timeout))
}

/// In-process collaborators, used when no sidecar is configured.
#[derive(Clone, Default)]
pub struct InMemoryBackends {
    pub store: InMemoryStateStore,
    pub inventory: InMemoryAvailabilityChecker,
    pub bus: InMemoryEventBus,
}

impl InMemoryBackends {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Creates application state backed entirely by in-memory components.
///
/// The dispatcher is not yet subscribed to `backends.bus`; call
/// [`NotificationDispatcher::start`] for that.
pub fn create_default_state(config: &Config, backends: &InMemoryBackends) -> Arc<AppState> {
    Arc::new(AppState::new(
        Arc::new(backends.store.clone()),
        Arc::new(backends.inventory.clone()),
        Arc::new(backends.bus.clone()),
        config,
    ))
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(routes::orders::create).get(routes::orders::list),
        )
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/status", put(routes::orders::update_status))
        .route("/orders/{id}/cancel", post(routes::orders::cancel))
        .route("/dapr/subscribe", get(routes::events::subscriptions))
        .route("/events/{topic}", post(routes::events::receive))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
