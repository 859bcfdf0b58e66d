//! Publisher that hands events to a Dapr sidecar over HTTP.

use std::time::Duration;

use async_trait::async_trait;

use crate::publisher::EventPublisher;
use crate::{BusEvent, EventBusError};

/// Pub/sub component name configured in the sidecar.
pub const DEFAULT_PUBSUB_NAME: &str = "kafka-pubsub";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Publishes events through the sidecar's publish endpoint,
/// `POST {endpoint}/v1.0/publish/{pubsub}/{topic}`.
#[derive(Clone)]
pub struct DaprEventPublisher {
    endpoint: String,
    pubsub_name: String,
    client: reqwest::Client,
}

impl DaprEventPublisher {
    /// Creates a publisher for the sidecar at `endpoint`
    /// (e.g. `http://localhost:3500`).
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a publisher whose requests give up after `timeout`.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoint: endpoint.into(),
            pubsub_name: DEFAULT_PUBSUB_NAME.to_string(),
            client,
        }
    }

    /// Overrides the pub/sub component name.
    pub fn pubsub_name(mut self, name: impl Into<String>) -> Self {
        self.pubsub_name = name.into();
        self
    }

    fn publish_url(&self, topic: &str) -> String {
        format!(
            "{}/v1.0/publish/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.pubsub_name,
            topic
        )
    }
}

#[async_trait]
impl EventPublisher for DaprEventPublisher {
    #[tracing::instrument(skip(self, event), fields(event_id = %event.event_id()))]
    async fn publish(&self, topic: &str, event: &BusEvent) -> Result<(), EventBusError> {
        let response = self
            .client
            .post(self.publish_url(topic))
            .json(event)
            .send()
            .await
            .map_err(|e| EventBusError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(%status, "event accepted by sidecar");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(EventBusError::PublishFailed {
            topic: topic.to_string(),
            reason: format!("sidecar returned {status}: {body}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics;
    use axum::Router;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::post;
    use chrono::Utc;
    use domain::{Money, NewOrder, Order};
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<(String, String, serde_json::Value)>>>;

    async fn spawn_sidecar(status: StatusCode) -> (String, Received) {
        let received: Received = Arc::default();
        let sink = received.clone();
        let app = Router::new().route(
            "/v1.0/publish/{pubsub}/{topic}",
            post(
                move |Path((pubsub, topic)): Path<(String, String)>,
                      axum::Json(body): axum::Json<serde_json::Value>| {
                    let sink = sink.clone();
                    async move {
                        sink.lock().unwrap().push((pubsub, topic, body));
                        status
                    }
                },
            ),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        (format!("http://{addr}"), received)
    }

    fn event() -> BusEvent {
        let order = Order::place(
            NewOrder::new("c1").with_item("p1", 2, Money::from_cents(2999)),
            Utc::now(),
        )
        .unwrap();
        BusEvent::order_created(&order)
    }

    #[tokio::test]
    async fn posts_envelope_to_publish_endpoint() {
        let (endpoint, received) = spawn_sidecar(StatusCode::NO_CONTENT).await;
        let publisher = DaprEventPublisher::new(format!("{endpoint}/"));
        let event = event();

        publisher
            .publish(topics::ORDER_CREATED, &event)
            .await
            .unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        let (pubsub, topic, body) = &received[0];
        assert_eq!(pubsub, DEFAULT_PUBSUB_NAME);
        assert_eq!(topic, "order.created");
        assert_eq!(body["event_type"], "order.created");
        assert_eq!(body["event_id"], event.event_id().to_string());
        assert_eq!(body["total_amount"], 59.98);
    }

    #[tokio::test]
    async fn custom_pubsub_name_is_used() {
        let (endpoint, received) = spawn_sidecar(StatusCode::OK).await;
        let publisher = DaprEventPublisher::new(endpoint).pubsub_name("orders");

        publisher
            .publish(topics::ORDER_UPDATED, &event())
            .await
            .unwrap();

        assert_eq!(received.lock().unwrap()[0].0, "orders");
    }

    #[tokio::test]
    async fn error_status_maps_to_publish_failed() {
        let (endpoint, _) = spawn_sidecar(StatusCode::INTERNAL_SERVER_ERROR).await;
        let publisher = DaprEventPublisher::new(endpoint);

        let result = publisher.publish(topics::ORDER_CREATED, &event()).await;

        match result {
            Err(EventBusError::PublishFailed { topic, reason }) => {
                assert_eq!(topic, "order.created");
                assert!(reason.contains("500"), "{reason}");
            }
            other => panic!("expected PublishFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_sidecar_is_a_connection_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let publisher =
            DaprEventPublisher::with_timeout(format!("http://{addr}"), Duration::from_millis(500));
        let result = publisher.publish(topics::ORDER_CREATED, &event()).await;

        assert!(matches!(result, Err(EventBusError::ConnectionFailed(_))));
    }
}
