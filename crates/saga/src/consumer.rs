//! The order event consumer and its per-type handlers.

use std::sync::Arc;

use broker::{Connection, ORDER_EVENTS_QUEUE};
use domain::{
    OrderEventPayload, OrderRepository, OrderStatus, ProductRepository, StockDecrement,
};
use serde::Deserialize;
use tokio::sync::watch;

use crate::applied::AppliedEventLog;
use crate::error::ConsumerError;

/// A message as received off the queue: the envelope's event id plus the
/// event body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomingEvent {
    event_id: String,

    #[serde(flatten)]
    payload: OrderEventPayload,
}

/// Applies order events to the consumer side's own projections.
///
/// Dispatches on the payload's status field: `pending` adjusts stock,
/// `paid` completes the mirrored order, `cancelled` restores stock and
/// cancels the mirror. Data-skew anomalies (missing product or order,
/// insufficient local stock) are logged and the event is dropped without
/// error; only malformed or ill-typed messages fail the handler.
pub struct OrderEventConsumer<P, O, A>
where
    P: ProductRepository,
    O: OrderRepository,
    A: AppliedEventLog,
{
    products: P,
    orders: O,
    applied: A,
}

impl<P, O, A> OrderEventConsumer<P, O, A>
where
    P: ProductRepository,
    O: OrderRepository,
    A: AppliedEventLog,
{
    /// Creates a consumer over this side's projections.
    pub fn new(products: P, orders: O, applied: A) -> Self {
        Self {
            products,
            orders,
            applied,
        }
    }

    /// Parses and applies one message body.
    #[tracing::instrument(skip(self, body))]
    pub async fn handle_message(&self, body: &[u8]) -> Result<(), ConsumerError> {
        let event: IncomingEvent = serde_json::from_slice(body)?;
        metrics::counter!("order_events_consumed_total").increment(1);

        match event.payload.status {
            OrderStatus::Pending => self.handle_placed(&event).await,
            OrderStatus::Paid => self.handle_paid(&event).await,
            OrderStatus::Cancelled => self.handle_cancelled(&event).await,
            OrderStatus::Completed => {
                tracing::warn!(event_id = %event.event_id, "unexpected event status; ignoring");
                Ok(())
            }
        }
    }

    /// `order.placed`: decrement this side's stock by the ordered quantity.
    async fn handle_placed(&self, event: &IncomingEvent) -> Result<(), ConsumerError> {
        let payload = &event.payload;
        let quantity = payload
            .quantity
            .ok_or(ConsumerError::MissingField("quantity"))?;

        if !self.applied.mark_if_new(&event.event_id).await? {
            tracing::debug!(event_id = %event.event_id, "duplicate delivery ignored");
            return Ok(());
        }

        match self
            .products
            .try_decrement_stock(payload.product_id, quantity)
            .await?
        {
            StockDecrement::Applied { remaining } => {
                tracing::info!(
                    product_id = %payload.product_id,
                    order_id = %payload.order_id,
                    remaining,
                    "stock reduced for placed order"
                );
            }
            StockDecrement::Insufficient { available } => {
                tracing::error!(
                    product_id = %payload.product_id,
                    available,
                    requested = quantity,
                    "insufficient local stock; event dropped"
                );
            }
            StockDecrement::NotFound => {
                tracing::error!(
                    product_id = %payload.product_id,
                    "product not found on this side; event dropped"
                );
            }
        }

        Ok(())
    }

    /// `order.paid`: mark the mirrored order completed.
    async fn handle_paid(&self, event: &IncomingEvent) -> Result<(), ConsumerError> {
        let payload = &event.payload;

        if !self.applied.mark_if_new(&event.event_id).await? {
            tracing::debug!(event_id = %event.event_id, "duplicate delivery ignored");
            return Ok(());
        }

        match self
            .orders
            .update_status(payload.order_id, OrderStatus::Completed)
            .await?
        {
            Some(order) => {
                tracing::info!(order_id = %order.id, "order marked as completed");
            }
            None => {
                tracing::error!(
                    order_id = %payload.order_id,
                    "order not found on this side; event dropped"
                );
            }
        }

        Ok(())
    }

    /// `order.cancelled`: restore stock by the order's quantity, then mark
    /// the mirrored order cancelled.
    ///
    /// The restore is attempted regardless of the order's side-local
    /// status; the applied-event guard is what keeps redeliveries from
    /// over-restoring.
    async fn handle_cancelled(&self, event: &IncomingEvent) -> Result<(), ConsumerError> {
        let payload = &event.payload;

        if !self.applied.mark_if_new(&event.event_id).await? {
            tracing::debug!(event_id = %event.event_id, "duplicate delivery ignored");
            return Ok(());
        }

        let Some(order) = self.orders.find(payload.order_id).await? else {
            tracing::error!(
                order_id = %payload.order_id,
                "order not found on this side; event dropped"
            );
            return Ok(());
        };

        match self
            .products
            .restore_stock(payload.product_id, order.quantity)
            .await?
        {
            Some(new_stock) => {
                tracing::info!(
                    product_id = %payload.product_id,
                    order_id = %order.id,
                    new_stock,
                    "stock restored for cancelled order"
                );
            }
            None => {
                tracing::warn!(
                    product_id = %payload.product_id,
                    "product not found on this side; stock not restored"
                );
            }
        }

        self.orders
            .update_status(order.id, OrderStatus::Cancelled)
            .await?;
        tracing::info!(order_id = %order.id, "order cancelled on consumer side");

        Ok(())
    }
}

/// Consumes `order.events` one message at a time until shutdown.
///
/// Each message is fully handled before the next is accepted. Handler
/// success acks; handler failure nacks without requeue, sending the
/// message down the dead-letter path after this one attempt.
pub async fn run_consumer<P, O, A>(
    conn: Arc<Connection>,
    consumer: OrderEventConsumer<P, O, A>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ConsumerError>
where
    P: ProductRepository,
    O: OrderRepository,
    A: AppliedEventLog,
{
    conn.ensure_open().await?;
    let subscription = conn.broker().subscribe(ORDER_EVENTS_QUEUE).await?;
    tracing::info!(queue = ORDER_EVENTS_QUEUE, "consumer started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            delivery = subscription.next() => {
                let Some(delivery) = delivery else { break };

                match consumer.handle_message(&delivery.body).await {
                    Ok(()) => subscription.ack(delivery.delivery_tag).await?,
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            routing_key = %delivery.routing_key,
                            redelivered = delivery.redelivered,
                            "message handling failed; dead-lettering"
                        );
                        metrics::counter!("order_events_dead_lettered_total").increment(1);
                        subscription.nack(delivery.delivery_tag, false).await?;
                    }
                }
            }
        }
    }

    tracing::info!("consumer stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applied::InMemoryAppliedEventLog;
    use common::{OrderId, ProductId, UserId};
    use domain::{
        InMemoryOrderRepository, InMemoryProductRepository, Money, NewOrder, Product,
    };

    type TestConsumer = OrderEventConsumer<
        InMemoryProductRepository,
        InMemoryOrderRepository,
        InMemoryAppliedEventLog,
    >;

    async fn setup(stock: u32) -> (TestConsumer, InMemoryProductRepository, InMemoryOrderRepository) {
        let products = InMemoryProductRepository::seeded(vec![Product::new(
            ProductId::new(5),
            "Keyboard",
            Money::from_cents(1000),
            stock,
        )])
        .await;
        let orders = InMemoryOrderRepository::new();
        let consumer =
            OrderEventConsumer::new(products.clone(), orders.clone(), InMemoryAppliedEventLog::new());
        (consumer, products, orders)
    }

    async fn seed_order(orders: &InMemoryOrderRepository, quantity: u32) -> OrderId {
        orders
            .insert(NewOrder {
                product_id: ProductId::new(5),
                user_id: UserId::new(3),
                quantity,
                total_amount: Money::from_cents(1000).multiply(quantity),
            })
            .await
            .unwrap()
            .id
    }

    fn placed_body(event_id: &str, order_id: i64, quantity: u32) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "eventId": event_id,
            "timestamp": "2024-01-01T00:00:00Z",
            "orderId": order_id,
            "userId": 3,
            "productId": 5,
            "quantity": quantity,
            "totalAmount": quantity as f64 * 10.0,
            "status": "pending"
        }))
        .unwrap()
    }

    fn paid_body(event_id: &str, order_id: i64) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "eventId": event_id,
            "timestamp": "2024-01-01T00:00:00Z",
            "orderId": order_id,
            "userId": 3,
            "productId": 5,
            "status": "paid"
        }))
        .unwrap()
    }

    fn cancelled_body(event_id: &str, order_id: i64, quantity: u32) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "eventId": event_id,
            "timestamp": "2024-01-01T00:00:00Z",
            "orderId": order_id,
            "userId": 3,
            "productId": 5,
            "quantity": quantity,
            "status": "cancelled"
        }))
        .unwrap()
    }

    async fn stock(products: &InMemoryProductRepository) -> u32 {
        products
            .find(ProductId::new(5))
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    #[tokio::test]
    async fn placed_event_decrements_stock() {
        let (consumer, products, _) = setup(10).await;

        consumer
            .handle_message(&placed_body("evt-1", 1, 2))
            .await
            .unwrap();

        assert_eq!(stock(&products).await, 8);
    }

    #[tokio::test]
    async fn redelivered_placed_event_decrements_once() {
        let (consumer, products, _) = setup(10).await;
        let body = placed_body("evt-1", 1, 2);

        consumer.handle_message(&body).await.unwrap();
        consumer.handle_message(&body).await.unwrap();

        assert_eq!(stock(&products).await, 8);
    }

    #[tokio::test]
    async fn placed_event_with_insufficient_stock_is_dropped() {
        let (consumer, products, _) = setup(1).await;

        // No error: the anomaly is logged and the event dropped.
        consumer
            .handle_message(&placed_body("evt-1", 1, 2))
            .await
            .unwrap();

        assert_eq!(stock(&products).await, 1);
    }

    #[tokio::test]
    async fn placed_event_for_unknown_product_is_dropped() {
        let (consumer, _, _) = setup(10).await;

        let body = serde_json::to_vec(&serde_json::json!({
            "eventId": "evt-1",
            "orderId": 1,
            "userId": 3,
            "productId": 99,
            "quantity": 2,
            "status": "pending"
        }))
        .unwrap();

        consumer.handle_message(&body).await.unwrap();
    }

    #[tokio::test]
    async fn placed_event_without_quantity_fails() {
        let (consumer, _, _) = setup(10).await;

        let body = serde_json::to_vec(&serde_json::json!({
            "eventId": "evt-1",
            "orderId": 1,
            "userId": 3,
            "productId": 5,
            "status": "pending"
        }))
        .unwrap();

        let result = consumer.handle_message(&body).await;
        assert!(matches!(result, Err(ConsumerError::MissingField("quantity"))));
    }

    #[tokio::test]
    async fn paid_event_completes_mirrored_order() {
        let (consumer, _, orders) = setup(10).await;
        let order_id = seed_order(&orders, 2).await;

        consumer
            .handle_message(&paid_body("evt-1", order_id.as_i64()))
            .await
            .unwrap();

        let order = orders.find(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn paid_event_for_unknown_order_is_dropped() {
        let (consumer, _, _) = setup(10).await;

        consumer
            .handle_message(&paid_body("evt-1", 42))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_event_restores_stock_and_cancels_mirror() {
        let (consumer, products, orders) = setup(10).await;
        let order_id = seed_order(&orders, 2).await;

        // Placement consumed first: stock drops to 8.
        consumer
            .handle_message(&placed_body("evt-1", order_id.as_i64(), 2))
            .await
            .unwrap();

        consumer
            .handle_message(&cancelled_body("evt-2", order_id.as_i64(), 2))
            .await
            .unwrap();

        assert_eq!(stock(&products).await, 10);
        let order = orders.find(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn redelivered_cancelled_event_restores_at_most_once() {
        let (consumer, products, orders) = setup(10).await;
        let order_id = seed_order(&orders, 2).await;

        consumer
            .handle_message(&placed_body("evt-1", order_id.as_i64(), 2))
            .await
            .unwrap();

        let body = cancelled_body("evt-2", order_id.as_i64(), 2);
        consumer.handle_message(&body).await.unwrap();
        consumer.handle_message(&body).await.unwrap();

        assert_eq!(stock(&products).await, 10);
    }

    #[tokio::test]
    async fn cancelled_event_for_unknown_order_is_dropped() {
        let (consumer, products, _) = setup(10).await;

        consumer
            .handle_message(&cancelled_body("evt-1", 42, 2))
            .await
            .unwrap();

        assert_eq!(stock(&products).await, 10);
    }

    #[tokio::test]
    async fn restore_uses_the_orders_quantity() {
        let (consumer, products, orders) = setup(10).await;
        let order_id = seed_order(&orders, 3).await;

        consumer
            .handle_message(&placed_body("evt-1", order_id.as_i64(), 3))
            .await
            .unwrap();
        assert_eq!(stock(&products).await, 7);

        // Event claims quantity 1, but the order row says 3.
        consumer
            .handle_message(&cancelled_body("evt-2", order_id.as_i64(), 1))
            .await
            .unwrap();
        assert_eq!(stock(&products).await, 10);
    }

    #[tokio::test]
    async fn malformed_message_fails() {
        let (consumer, _, _) = setup(10).await;

        let result = consumer.handle_message(b"not json at all").await;
        assert!(matches!(result, Err(ConsumerError::Malformed(_))));

        let missing_event_id = serde_json::to_vec(&serde_json::json!({
            "orderId": 1,
            "userId": 3,
            "productId": 5,
            "status": "pending"
        }))
        .unwrap();
        let result = consumer.handle_message(&missing_event_id).await;
        assert!(matches!(result, Err(ConsumerError::Malformed(_))));
    }

    #[tokio::test]
    async fn completed_status_is_ignored() {
        let (consumer, products, _) = setup(10).await;

        let body = serde_json::to_vec(&serde_json::json!({
            "eventId": "evt-1",
            "orderId": 1,
            "userId": 3,
            "productId": 5,
            "status": "completed"
        }))
        .unwrap();

        consumer.handle_message(&body).await.unwrap();
        assert_eq!(stock(&products).await, 10);
    }
}
