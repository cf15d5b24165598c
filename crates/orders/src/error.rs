use broker::BrokerError;
use common::{OrderId, ProductId};
use domain::{OrderStatus, RepositoryError};
use event_store::EventStoreError;
use thiserror::Error;

/// Errors that can occur on the command path.
///
/// Validation errors are raised before any mutation; infrastructure errors
/// abort the command as failed rather than being swallowed.
#[derive(Debug, Error)]
pub enum OrderError {
    /// No product with this id exists.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The requested quantity exceeds the available stock.
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    /// The requested quantity is not a positive integer.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// No order with this id exists for this user.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order is not in a payable status.
    #[error("Order cannot be paid from {status} status")]
    CannotPay { status: OrderStatus },

    /// The order was already cancelled.
    #[error("Order {0} is already cancelled")]
    AlreadyCancelled(OrderId),

    /// Completed orders cannot be cancelled.
    #[error("Cannot cancel completed order {0}")]
    CannotCancelCompleted(OrderId),

    /// The order or product store failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// The event store rejected the append.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// The messaging layer failed.
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// An event payload could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
