//! Order aggregate and status state machine.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// The status of an order in its lifecycle.
///
/// Transitions:
/// ```text
/// pending ──┬──► paid ──┬──► completed
///           │           │
///           └───────────┴──► cancelled
/// ```
///
/// `completed` is reached only by the consumer side applying an
/// `order.paid` event; `cancelled` and `completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed, awaiting payment.
    #[default]
    Pending,

    /// Paid by the user, awaiting reconciliation.
    Paid,

    /// Cancelled (terminal).
    Cancelled,

    /// Reconciled after payment (terminal).
    Completed,
}

impl OrderStatus {
    /// Returns true if the order can be paid in this status.
    pub fn can_pay(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Paid)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Completed)
    }

    /// Returns the wire representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An order as stored by either service.
///
/// The total amount is fixed at placement time (quantity times the unit
/// price then in effect) and never recomputed. Orders are never deleted;
/// they only move through the status state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub quantity: u32,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A new order before the store assigns its id and timestamps.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub quantity: u32,
    pub total_amount: Money,
}
