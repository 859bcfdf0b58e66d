//! Topic names. Each event type is published on the topic of the same name.

pub const ORDER_CREATED: &str = "order.created";
pub const ORDER_UPDATED: &str = "order.updated";
pub const ORDER_CANCELLED: &str = "order.cancelled";
pub const PAYMENT_PROCESSED: &str = "payment.processed";
pub const INVENTORY_UPDATED: &str = "inventory.updated";

/// Every topic the notification pipeline listens on.
pub const NOTIFICATION_TOPICS: [&str; 5] = [
    ORDER_CREATED,
    ORDER_UPDATED,
    ORDER_CANCELLED,
    PAYMENT_PROCESSED,
    INVENTORY_UPDATED,
];
