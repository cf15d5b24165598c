//! Order command service.

use broker::Envelope;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use domain::{
    CancelOrder, Money, NewOrder, Order, OrderEvent, OrderRepository, OrderStatus, PayOrder,
    PlaceOrder, Product, ProductRepository,
};
use event_store::{EventRecord, EventStore};
use serde::Serialize;

use crate::error::OrderError;
use crate::outbox::Outbox;

/// An order joined with its product's name, as returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub quantity: u32,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub product_name: String,
}

/// The command-accepting service.
///
/// Each accepted command validates and mutates the order aggregate, appends
/// the resulting domain event to the event store, and stages the envelope
/// for publication. A command that cannot record its event fails as a
/// whole; a command that fails validation leaves no partial effect.
///
/// The service reads its own product copy to validate stock but never
/// decrements it — the decrement is applied by the saga consumer from the
/// event stream, so the two stock copies are only eventually consistent.
pub struct OrderService<P, O, S, X>
where
    P: ProductRepository,
    O: OrderRepository,
    S: EventStore,
    X: Outbox,
{
    products: P,
    orders: O,
    store: S,
    outbox: X,
}

impl<P, O, S, X> OrderService<P, O, S, X>
where
    P: ProductRepository,
    O: OrderRepository,
    S: EventStore,
    X: Outbox,
{
    /// Creates a new order service.
    pub fn new(products: P, orders: O, store: S, outbox: X) -> Self {
        Self {
            products,
            orders,
            store,
            outbox,
        }
    }

    /// Places a new order.
    ///
    /// Validates that the product exists and has sufficient stock, fixes
    /// the total amount at the current unit price, and creates the order
    /// in `pending` status.
    #[tracing::instrument(skip(self))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order, OrderError> {
        if cmd.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                quantity: cmd.quantity,
            });
        }

        let product = self
            .products
            .find(cmd.product_id)
            .await?
            .ok_or(OrderError::ProductNotFound(cmd.product_id))?;

        if product.stock < cmd.quantity {
            return Err(OrderError::InsufficientStock {
                product_id: cmd.product_id,
                available: product.stock,
                requested: cmd.quantity,
            });
        }

        let total_amount = product.price.multiply(cmd.quantity);
        let order = self
            .orders
            .insert(NewOrder {
                product_id: cmd.product_id,
                user_id: cmd.user_id,
                quantity: cmd.quantity,
                total_amount,
            })
            .await?;

        self.record_and_stage(&OrderEvent::placed(&order)).await?;

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(order_id = %order.id, user_id = %order.user_id, "order placed");

        Ok(order)
    }

    /// Pays a pending order owned by the user.
    #[tracing::instrument(skip(self))]
    pub async fn pay_order(&self, cmd: PayOrder) -> Result<Order, OrderError> {
        let order = self
            .orders
            .find_for_user(cmd.order_id, cmd.user_id)
            .await?
            .ok_or(OrderError::OrderNotFound(cmd.order_id))?;

        if !order.status.can_pay() {
            return Err(OrderError::CannotPay {
                status: order.status,
            });
        }

        let updated = self
            .orders
            .update_status(order.id, OrderStatus::Paid)
            .await?
            .ok_or(OrderError::OrderNotFound(cmd.order_id))?;

        self.record_and_stage(&OrderEvent::paid(&updated)).await?;

        metrics::counter!("orders_paid_total").increment(1);
        tracing::info!(order_id = %updated.id, "order paid");

        Ok(updated)
    }

    /// Cancels a pending or paid order owned by the user.
    ///
    /// The stock itself is restored by the consumer when it applies the
    /// cancellation event; the command side only verifies the product
    /// still exists.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, cmd: CancelOrder) -> Result<Order, OrderError> {
        let order = self
            .orders
            .find_for_user(cmd.order_id, cmd.user_id)
            .await?
            .ok_or(OrderError::OrderNotFound(cmd.order_id))?;

        match order.status {
            OrderStatus::Cancelled => return Err(OrderError::AlreadyCancelled(order.id)),
            OrderStatus::Completed => return Err(OrderError::CannotCancelCompleted(order.id)),
            OrderStatus::Pending | OrderStatus::Paid => {}
        }

        self.products
            .find(order.product_id)
            .await?
            .ok_or(OrderError::ProductNotFound(order.product_id))?;

        let updated = self
            .orders
            .update_status(order.id, OrderStatus::Cancelled)
            .await?
            .ok_or(OrderError::OrderNotFound(cmd.order_id))?;

        self.record_and_stage(&OrderEvent::cancelled(&updated)).await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(order_id = %updated.id, "order cancelled");

        Ok(updated)
    }

    /// Lists a user's orders, newest first, with product names joined.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<OrderSummary>, OrderError> {
        let orders = self.orders.list_for_user(user_id).await?;

        let mut summaries = Vec::with_capacity(orders.len());
        for order in orders {
            let product_name = self
                .products
                .find(order.product_id)
                .await?
                .map(|p| p.name)
                .unwrap_or_else(|| "Unknown Product".to_string());

            summaries.push(OrderSummary {
                id: order.id,
                product_id: order.product_id,
                user_id: order.user_id,
                quantity: order.quantity,
                total_amount: order.total_amount,
                status: order.status,
                created_at: order.created_at,
                updated_at: order.updated_at,
                product_name,
            });
        }

        Ok(summaries)
    }

    /// Lists all products, ascending by id.
    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, OrderError> {
        Ok(self.products.list().await?)
    }

    /// Appends the event to the store and stages its envelope.
    ///
    /// A SQL deployment wraps these in one storage transaction; the
    /// in-memory stores keep the same call boundary.
    async fn record_and_stage(&self, event: &OrderEvent) -> Result<(), OrderError> {
        let payload = event.payload_json()?;
        let correlation = event.payload();

        self.store
            .record(
                EventRecord::builder()
                    .event_type(event.routing_key())
                    .payload(payload.clone())
                    .user_id(correlation.user_id)
                    .product_id(correlation.product_id)
                    .order_id(correlation.order_id)
                    .aggregate(format!("order-{}", correlation.order_id), "order")
                    .build()?,
            )
            .await?;

        self.outbox
            .stage(Envelope::new(event.routing_key(), payload)?)
            .await?;

        Ok(())
    }
}
