//! Pub/sub delivery endpoints for the notification dispatcher.
//!
//! The sidecar reads `GET /dapr/subscribe` once at startup and then POSTs
//! each message to the listed route. The response status tells it whether
//! to redeliver.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use event_bus::dapr::DEFAULT_PUBSUB_NAME;
use event_bus::{BusEvent, topics};
use notifications::DispatchOutcome;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct Subscription {
    pub pubsubname: &'static str,
    pub topic: &'static str,
    pub route: String,
}

/// Messages arrive either wrapped in a CloudEvent or as the bare envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum Inbound {
    Bare(BusEvent),
    CloudEvent { data: BusEvent },
}

impl Inbound {
    fn into_event(self) -> BusEvent {
        match self {
            Inbound::Bare(event) | Inbound::CloudEvent { data: event } => event,
        }
    }
}

/// GET /dapr/subscribe — topics the dispatcher consumes.
pub async fn subscriptions() -> Json<Vec<Subscription>> {
    Json(
        topics::NOTIFICATION_TOPICS
            .iter()
            .map(|&topic| Subscription {
                pubsubname: DEFAULT_PUBSUB_NAME,
                topic,
                route: format!("/events/{topic}"),
            })
            .collect(),
    )
}

/// POST /events/{topic} — hand one delivery to the dispatcher.
///
/// Answers `SUCCESS` once the event is dispatched, deduplicated or skipped,
/// `RETRY` with a 500 when the history store failed, and `DROP` for a
/// payload that can never be decoded.
#[tracing::instrument(skip(state, body))]
pub async fn receive(
    State(state): State<Arc<AppState>>,
    Path(topic): Path<String>,
    body: Bytes,
) -> (StatusCode, Json<serde_json::Value>) {
    let event = match serde_json::from_slice::<Inbound>(&body) {
        Ok(inbound) => inbound.into_event(),
        Err(e) => {
            tracing::warn!(error = %e, "undecodable event dropped");
            return (StatusCode::OK, Json(json!({ "status": "DROP" })));
        }
    };

    if event.topic() != topic {
        tracing::warn!(
            event_type = event.event_type(),
            "event delivered on a different topic than its type"
        );
    }

    match state.dispatcher.handle(&event).await {
        Ok(outcome) => {
            if let DispatchOutcome::Skipped(reason) = &outcome {
                tracing::debug!(event_id = %event.event_id(), %reason, "nothing to send");
            }
            (StatusCode::OK, Json(json!({ "status": "SUCCESS" })))
        }
        Err(e) => {
            tracing::error!(event_id = %event.event_id(), error = %e, "dispatch failed, asking for redelivery");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "RETRY" })),
            )
        }
    }
}
