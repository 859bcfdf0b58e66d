//! Order service endpoints.
//!
//! Every response, success or failure, carries `success` and `message`.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId};
use domain::{Money, NewOrder, Order, OrderItem, OrderStatus};
use saga::SagaError;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub shipping_address: String,
    #[serde(default)]
    pub payment_method: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    #[serde(default)]
    pub product_id: String,
    pub quantity: i64,
    /// Price per unit in currency units, e.g. `29.99`.
    pub unit_price: f64,
}

impl CreateOrderRequest {
    fn into_new_order(self) -> Result<NewOrder, SagaError> {
        let mut order = NewOrder::new(self.customer_id)
            .shipping_address(self.shipping_address)
            .payment_method(self.payment_method);

        for item in self.items {
            let unit_price = Money::from_decimal(item.unit_price)?;
            order = order.with_item(item.product_id, item.quantity, unit_price);
        }
        if let Some(email) = self.customer_email.filter(|e| !e.trim().is_empty()) {
            order = order.customer_email(email);
        }
        if let Some(phone) = self.customer_phone.filter(|p| !p.trim().is_empty()) {
            order = order.customer_phone(phone);
        }
        Ok(order)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub customer_id: Option<String>,
    #[serde(default)]
    pub page_size: usize,
    #[serde(default)]
    pub page_token: Option<String>,
}

// -- Response types --

/// An order as the API presents it; amounts are in currency units.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub customer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total_price: f64,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
            unit_price: item.unit_price.to_decimal(),
            total_price: item.total_price.to_decimal(),
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id().to_string(),
            customer_id: order.customer_id().to_string(),
            customer_email: order.customer_email().map(str::to_string),
            customer_phone: order.customer_phone().map(str::to_string),
            items: order.items().iter().map(OrderItemResponse::from).collect(),
            total_amount: order.total_amount().to_decimal(),
            status: order.status(),
            shipping_address: order.shipping_address().to_string(),
            payment_method: order.payment_method().to_string(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderEnvelope {
    pub success: bool,
    pub message: String,
    pub order: OrderResponse,
}

impl OrderEnvelope {
    fn ok(message: &str, order: &Order) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
            order: order.into(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct OrderListEnvelope {
    pub success: bool,
    pub message: String,
    pub orders: Vec<OrderResponse>,
    /// Empty once the listing is exhausted.
    pub next_page_token: String,
    pub total_count: usize,
}

// -- Handlers --

/// POST /orders — validate, persist and announce a new order.
#[tracing::instrument(skip_all)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderEnvelope>), ApiError> {
    let Json(req) = body?;
    let order = state.coordinator.create_order(req.into_new_order()?).await?;

    Ok((
        StatusCode::CREATED,
        OrderEnvelope::ok("Order created successfully", &order),
    ))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderEnvelope>, ApiError> {
    let order = state.coordinator.get_order(&OrderId::from(id)).await?;
    Ok(OrderEnvelope::ok("Order retrieved successfully", &order))
}

/// PUT /orders/{id}/status — move an order through its lifecycle.
#[tracing::instrument(skip(state, body))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderEnvelope>, ApiError> {
    let Json(req) = body?;
    let status = OrderStatus::from_str(&req.status).map_err(SagaError::from)?;
    let notes = req.notes.filter(|n| !n.trim().is_empty());

    let order = state
        .coordinator
        .update_order(&OrderId::from(id), status, notes)
        .await?;
    Ok(OrderEnvelope::ok("Order updated successfully", &order))
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip(state, body))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<CancelOrderRequest>, JsonRejection>,
) -> Result<Json<OrderEnvelope>, ApiError> {
    let req = match body {
        Ok(Json(req)) => req,
        Err(JsonRejection::MissingJsonContentType(_)) => CancelOrderRequest::default(),
        Err(rejection) => return Err(rejection.into()),
    };
    let reason = match req.reason.trim() {
        "" => "Cancelled by customer",
        reason => reason,
    };

    let order = state
        .coordinator
        .cancel_order(&OrderId::from(id), reason)
        .await?;
    Ok(OrderEnvelope::ok("Order cancelled successfully", &order))
}

/// GET /orders?customer_id=&page_size=&page_token=
#[tracing::instrument(skip_all)]
pub async fn list(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<Json<OrderListEnvelope>, ApiError> {
    let Query(query) = query?;
    let customer_id = query
        .customer_id
        .ok_or_else(|| ApiError::BadRequest("customer_id is required".to_string()))?;

    let page = state
        .coordinator
        .list_orders(
            &CustomerId::new(customer_id),
            query.page_size,
            query.page_token.as_deref(),
        )
        .await?;

    Ok(Json(OrderListEnvelope {
        success: true,
        message: "Orders retrieved successfully".to_string(),
        orders: page.orders.iter().map(OrderResponse::from).collect(),
        next_page_token: page.next_page_token.unwrap_or_default(),
        total_count: page.total_count,
    }))
}
