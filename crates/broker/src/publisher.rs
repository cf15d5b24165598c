//! Event publisher for the command-accepting service.

use std::sync::Arc;

use serde_json::Value;

use crate::connection::Connection;
use crate::envelope::Envelope;
use crate::error::Result;
use crate::topology::EVENTS_EXCHANGE;

/// Publishes domain events to the `events` topic exchange.
///
/// Given a non-empty routing key and a payload object, constructs the wire
/// envelope (generated event id plus publish timestamp), serializes it, and
/// publishes it with persistence enabled. If no connection exists yet, the
/// call lazily establishes it first; if establishment fails past the retry
/// budget, the call fails with [`crate::BrokerError::Unavailable`] and the
/// triggering command must be treated as failed.
pub struct EventPublisher {
    conn: Arc<Connection>,
}

impl EventPublisher {
    /// Creates a publisher over the given connection resource.
    pub fn new(conn: Arc<Connection>) -> Self {
        Self { conn }
    }

    /// The connection this publisher uses.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    /// Wraps the payload in a fresh envelope and publishes it. Returns the
    /// envelope so callers can record the generated event id.
    #[tracing::instrument(skip(self, payload))]
    pub async fn publish(&self, routing_key: &str, payload: Value) -> Result<Envelope> {
        let envelope = Envelope::new(routing_key, payload)?;
        self.publish_envelope(&envelope).await?;
        Ok(envelope)
    }

    /// Publishes a previously constructed envelope (e.g. from the outbox).
    /// The event id stays stable across attempts.
    pub async fn publish_envelope(&self, envelope: &Envelope) -> Result<()> {
        self.conn.ensure_open().await?;

        let body = envelope.to_bytes()?;
        self.conn
            .broker()
            .publish(EVENTS_EXCHANGE, &envelope.routing_key, body, true)
            .await?;

        metrics::counter!("events_published_total").increment(1);
        tracing::info!(
            routing_key = %envelope.routing_key,
            event_id = %envelope.event_id,
            "event published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrokerError;
    use crate::memory::InProcessBroker;
    use crate::retry::RetryPolicy;
    use crate::topology::{ORDER_EVENTS_QUEUE, Topology};
    use crate::broker::MessageBroker;

    fn publisher_over(broker: InProcessBroker) -> EventPublisher {
        let conn = Connection::with_policy(
            Arc::new(broker),
            Topology::storefront(),
            RetryPolicy::no_retries(),
        );
        EventPublisher::new(Arc::new(conn))
    }

    #[tokio::test]
    async fn publish_lazily_establishes_connection() {
        let broker = InProcessBroker::new();
        let publisher = publisher_over(broker.clone());

        assert!(!publisher.connection().is_ready());

        publisher
            .publish("order.placed", serde_json::json!({"orderId": 1}))
            .await
            .unwrap();

        assert!(publisher.connection().is_ready());
        assert_eq!(broker.queue_depth(ORDER_EVENTS_QUEUE).await, 1);
    }

    #[tokio::test]
    async fn publish_rejects_empty_routing_key() {
        let publisher = publisher_over(InProcessBroker::new());
        let result = publisher.publish("", serde_json::json!({})).await;
        assert!(matches!(result, Err(BrokerError::EmptyRoutingKey)));
    }

    #[tokio::test]
    async fn publish_fails_when_broker_unavailable() {
        let broker = InProcessBroker::new();
        // Closing the broker first makes topology declaration fail.
        broker.close().await.unwrap();
        let publisher = publisher_over(broker);

        let result = publisher
            .publish("order.placed", serde_json::json!({"orderId": 1}))
            .await;
        assert!(matches!(result, Err(BrokerError::Unavailable(_))));
    }

    #[tokio::test]
    async fn published_body_carries_envelope_fields() {
        let broker = InProcessBroker::new();
        let publisher = publisher_over(broker.clone());

        let envelope = publisher
            .publish(
                "order.placed",
                serde_json::json!({"orderId": 1, "quantity": 2, "status": "pending"}),
            )
            .await
            .unwrap();

        let sub = broker.subscribe(ORDER_EVENTS_QUEUE).await.unwrap();
        let delivery = sub.next().await.unwrap();
        let (event_id, _ts, payload) = Envelope::parse_body(&delivery.body).unwrap();

        assert_eq!(event_id, envelope.event_id);
        assert_eq!(payload["orderId"], 1);
        assert_eq!(payload["status"], "pending");
        assert_eq!(delivery.routing_key, "order.placed");
    }
}
