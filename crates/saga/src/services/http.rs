//! Availability checker backed by the inventory service's HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use domain::ProductId;
use serde::{Deserialize, Serialize};

use super::availability::{Availability, AvailabilityChecker, AvailabilityError};

/// Inventory service reached through the local Dapr sidecar.
pub const DEFAULT_INVENTORY_BASE_URL: &str =
    "http://localhost:3500/v1.0/invoke/inventory-service/method";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Serialize)]
struct CheckRequest<'a> {
    product_id: &'a str,
    quantity: u32,
}

#[derive(Deserialize)]
struct CheckResponse {
    available: bool,
}

/// Calls `POST {base_url}/check-availability` with
/// `{product_id, quantity}` and reads `{available}` from the answer.
#[derive(Clone)]
pub struct HttpAvailabilityChecker {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAvailabilityChecker {
    /// Creates a checker targeting the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a checker whose requests give up after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn check_url(&self) -> String {
        format!(
            "{}/check-availability",
            self.base_url.trim_end_matches('/')
        )
    }
}

impl Default for HttpAvailabilityChecker {
    fn default() -> Self {
        Self::new(DEFAULT_INVENTORY_BASE_URL)
    }
}

#[async_trait]
impl AvailabilityChecker for HttpAvailabilityChecker {
    async fn check(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Availability, AvailabilityError> {
        let response = self
            .client
            .post(self.check_url())
            .json(&CheckRequest {
                product_id: product_id.as_str(),
                quantity,
            })
            .send()
            .await
            .map_err(|e| AvailabilityError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AvailabilityError::Unreachable(format!(
                "inventory service returned {status}"
            )));
        }

        let body = response
            .json::<CheckResponse>()
            .await
            .map_err(|e| AvailabilityError::InvalidResponse(e.to_string()))?;

        Ok(body.available.into())
    }
}
