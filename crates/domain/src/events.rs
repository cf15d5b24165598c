//! Order event wire types.

use common::{OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::order::{Order, OrderStatus};

/// Routing key for order placement events.
pub const ORDER_PLACED: &str = "order.placed";

/// Routing key for order payment events.
pub const ORDER_PAID: &str = "order.paid";

/// Routing key for order cancellation events.
pub const ORDER_CANCELLED: &str = "order.cancelled";

/// The closed set of order event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEventKind {
    Placed,
    Paid,
    Cancelled,
}

impl OrderEventKind {
    /// The routing key (and event type tag) for this kind.
    pub fn routing_key(&self) -> &'static str {
        match self {
            OrderEventKind::Placed => ORDER_PLACED,
            OrderEventKind::Paid => ORDER_PAID,
            OrderEventKind::Cancelled => ORDER_CANCELLED,
        }
    }
}

/// The event body shared by publisher and consumer.
///
/// Serialized with camelCase keys for wire compatibility. Optional fields
/// are omitted where the event kind does not carry them: payment events
/// have no quantity or amount, cancellation events carry the quantity so
/// the consumer can restore stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEventPayload {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub product_id: ProductId,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub quantity: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total_amount: Option<Money>,

    pub status: OrderStatus,
}

/// A domain event produced by an accepted command.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderEvent {
    kind: OrderEventKind,
    payload: OrderEventPayload,
}

impl OrderEvent {
    /// Event for an order that was just placed.
    pub fn placed(order: &Order) -> Self {
        Self {
            kind: OrderEventKind::Placed,
            payload: OrderEventPayload {
                order_id: order.id,
                user_id: order.user_id,
                product_id: order.product_id,
                quantity: Some(order.quantity),
                total_amount: Some(order.total_amount),
                status: OrderStatus::Pending,
            },
        }
    }

    /// Event for an order that was just paid.
    pub fn paid(order: &Order) -> Self {
        Self {
            kind: OrderEventKind::Paid,
            payload: OrderEventPayload {
                order_id: order.id,
                user_id: order.user_id,
                product_id: order.product_id,
                quantity: None,
                total_amount: None,
                status: OrderStatus::Paid,
            },
        }
    }

    /// Event for an order that was just cancelled.
    pub fn cancelled(order: &Order) -> Self {
        Self {
            kind: OrderEventKind::Cancelled,
            payload: OrderEventPayload {
                order_id: order.id,
                user_id: order.user_id,
                product_id: order.product_id,
                quantity: Some(order.quantity),
                total_amount: None,
                status: OrderStatus::Cancelled,
            },
        }
    }

    /// The event kind.
    pub fn kind(&self) -> OrderEventKind {
        self.kind
    }

    /// The routing key (doubles as the event type tag in the store).
    pub fn routing_key(&self) -> &'static str {
        self.kind.routing_key()
    }

    /// The event body.
    pub fn payload(&self) -> &OrderEventPayload {
        &self.payload
    }

    /// The event body as a JSON object.
    pub fn payload_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(&self.payload)
    }
}
