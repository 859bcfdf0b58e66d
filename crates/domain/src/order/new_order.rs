//! Requested orders, validated before anything is persisted.

use common::CustomerId;

use super::{Money, OrderError, OrderItem, ProductId};

/// A line item as requested by the caller, before validation.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    /// The product to order.
    pub product_id: ProductId,

    /// Requested quantity. Signed so that nonsense input reaches validation
    /// instead of failing at deserialization.
    pub quantity: i64,

    /// Price per unit.
    pub unit_price: Money,
}

impl NewOrderItem {
    /// Creates a new requested line item.
    pub fn new(product_id: impl Into<ProductId>, quantity: i64, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    fn validate(&self, index: usize) -> Result<OrderItem, OrderError> {
        if self.product_id.is_blank() {
            return Err(OrderError::ProductIdRequired { index });
        }

        let quantity = u32::try_from(self.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| OrderError::InvalidQuantity {
                product_id: self.product_id.to_string(),
                quantity: self.quantity,
            })?;

        if self.unit_price.is_negative() {
            return Err(OrderError::InvalidPrice {
                product_id: self.product_id.to_string(),
                price: self.unit_price,
            });
        }

        OrderItem::new(self.product_id.clone(), quantity, self.unit_price)
    }
}

/// A request to place an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// The customer placing the order.
    pub customer_id: CustomerId,

    /// Requested line items, in order.
    pub items: Vec<NewOrderItem>,

    /// Where the order ships to.
    pub shipping_address: String,

    /// How the customer pays.
    pub payment_method: String,

    /// Optional email contact for notifications.
    pub customer_email: Option<String>,

    /// Optional phone contact for notifications.
    pub customer_phone: Option<String>,
}

impl NewOrder {
    /// Creates an empty request for a customer.
    pub fn new(customer_id: impl Into<CustomerId>) -> Self {
        Self {
            customer_id: customer_id.into(),
            items: Vec::new(),
            shipping_address: String::new(),
            payment_method: String::new(),
            customer_email: None,
            customer_phone: None,
        }
    }

    /// Adds a line item.
    pub fn with_item(
        mut self,
        product_id: impl Into<ProductId>,
        quantity: i64,
        unit_price: Money,
    ) -> Self {
        self.items
            .push(NewOrderItem::new(product_id, quantity, unit_price));
        self
    }

    /// Sets the shipping address.
    pub fn shipping_address(mut self, address: impl Into<String>) -> Self {
        self.shipping_address = address.into();
        self
    }

    /// Sets the payment method.
    pub fn payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = method.into();
        self
    }

    /// Sets the email contact.
    pub fn customer_email(mut self, email: impl Into<String>) -> Self {
        self.customer_email = Some(email.into());
        self
    }

    /// Sets the phone contact.
    pub fn customer_phone(mut self, phone: impl Into<String>) -> Self {
        self.customer_phone = Some(phone.into());
        self
    }

    /// Validates the request and returns the line items it describes.
    pub fn validate(&self) -> Result<Vec<OrderItem>, OrderError> {
        if self.customer_id.is_blank() {
            return Err(OrderError::CustomerIdRequired);
        }

        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }

        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| item.validate(index))
            .collect()
    }
}
