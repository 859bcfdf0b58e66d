//! Message templates with `{{name}}` placeholders.

use std::collections::HashMap;

use crate::channel::{Channel, RenderedMessage};

/// Which template family an event renders with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    OrderCreated,
    /// Shared by `order.updated` and `order.cancelled`.
    OrderStatusChanged,
    PaymentProcessed,
    InventoryLow,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::OrderCreated => "order-created",
            TemplateKind::OrderStatusChanged => "order-updated",
            TemplateKind::PaymentProcessed => "payment-processed",
            TemplateKind::InventoryLow => "inventory-low",
        }
    }
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A subject and body, each of which may reference `{{name}}` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    subject: String,
    body: String,
}

impl Template {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Substitutes every `{{name}}` found in `vars`. Unknown placeholders
    /// are left as written.
    pub fn render(&self, vars: &HashMap<&str, String>) -> RenderedMessage {
        RenderedMessage {
            subject: substitute(&self.subject, vars),
            body: substitute(&self.body, vars),
        }
    }
}

fn substitute(text: &str, vars: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = after[..end].trim();
        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

/// The template for every (kind, channel) pair the dispatcher can send.
#[derive(Debug, Clone)]
pub struct Templates {
    templates: HashMap<(TemplateKind, Channel), Template>,
}

impl Templates {
    /// An empty set; every lookup misses.
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Adds or replaces one template.
    pub fn with_template(mut self, kind: TemplateKind, channel: Channel, template: Template) -> Self {
        self.templates.insert((kind, channel), template);
        self
    }

    pub fn get(&self, kind: TemplateKind, channel: Channel) -> Option<&Template> {
        self.templates.get(&(kind, channel))
    }

    /// Renders the template for `(kind, channel)`, if there is one.
    pub fn render(
        &self,
        kind: TemplateKind,
        channel: Channel,
        vars: &HashMap<&str, String>,
    ) -> Option<RenderedMessage> {
        self.get(kind, channel).map(|template| template.render(vars))
    }
}

impl Default for Templates {
    fn default() -> Self {
        use Channel::*;
        use TemplateKind::*;

        Self::empty()
            .with_template(
                OrderCreated,
                Email,
                Template::new(
                    "Order {{order_id}} confirmed",
                    "Thank you for your order. Order {{order_id}} totalling ${{total_amount}} has been received and is {{status}}.",
                ),
            )
            .with_template(
                OrderCreated,
                Sms,
                Template::new("", "Order {{order_id}} received. Total: ${{total_amount}}."),
            )
            .with_template(
                OrderCreated,
                Push,
                Template::new("Order received", "Order {{order_id}} is {{status}}."),
            )
            .with_template(
                OrderStatusChanged,
                Email,
                Template::new(
                    "Order {{order_id}} is now {{status}}",
                    "Your order {{order_id}} is now {{status}}. {{reason}}",
                ),
            )
            .with_template(
                OrderStatusChanged,
                Sms,
                Template::new("", "Order {{order_id}}: {{status}}. {{reason}}"),
            )
            .with_template(
                OrderStatusChanged,
                Push,
                Template::new("Order update", "Order {{order_id}} is now {{status}}."),
            )
            .with_template(
                PaymentProcessed,
                Email,
                Template::new(
                    "Payment for order {{order_id}}",
                    "Payment of ${{amount}} for order {{order_id}} is {{payment_status}}.",
                ),
            )
            .with_template(
                PaymentProcessed,
                Sms,
                Template::new("", "Payment ${{amount}} for order {{order_id}}: {{payment_status}}."),
            )
            .with_template(
                PaymentProcessed,
                Push,
                Template::new("Payment {{payment_status}}", "Order {{order_id}}: ${{amount}}."),
            )
            .with_template(
                InventoryLow,
                Email,
                Template::new(
                    "Low stock: {{product_id}}",
                    "{{product_name}} ({{product_id}}) is down to {{available_quantity}} units (threshold {{threshold}}).",
                ),
            )
            .with_template(
                InventoryLow,
                Webhook,
                Template::new(
                    "inventory.low",
                    "{{product_id}} available={{available_quantity}} threshold={{threshold}}",
                ),
            )
    }
}
