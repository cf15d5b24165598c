//! The broker trait seam.

use async_trait::async_trait;

use crate::error::Result;
use crate::topology::Topology;

/// A message delivered to a subscription.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Broker-assigned tag identifying this delivery for ack/nack.
    pub delivery_tag: u64,

    /// The routing key the message was published with.
    pub routing_key: String,

    /// The serialized wire body.
    pub body: Vec<u8>,

    /// True when this message was delivered before (at-least-once).
    pub redelivered: bool,
}

/// A consumer's view of one queue.
///
/// Subscriptions deliver one message at a time: the next delivery is not
/// handed out until the previous one has been acked or nacked.
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Waits for the next delivery. Returns `None` once the broker has
    /// been closed and the queue is drained.
    async fn next(&self) -> Option<Delivery>;

    /// Positively acknowledges a delivery.
    async fn ack(&self, delivery_tag: u64) -> Result<()>;

    /// Negatively acknowledges a delivery. With `requeue` false the
    /// message follows the dead-letter path; with no dead-letter target
    /// configured it is dropped after this one attempt.
    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<()>;
}

/// Trait for broker implementations.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Declares exchanges, queues, and bindings. Idempotent: redeclaring
    /// an identical topology is safe.
    async fn declare_topology(&self, topology: &Topology) -> Result<()>;

    /// Publishes a message to an exchange for routing. Success means the
    /// broker accepted the message; persistence to disk is the broker's
    /// responsibility given the persistent flag.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
        persistent: bool,
    ) -> Result<()>;

    /// Opens a subscription on a queue.
    async fn subscribe(&self, queue: &str) -> Result<Box<dyn Subscription>>;

    /// Closes the broker connection; pending consumers are woken and
    /// receive `None`.
    async fn close(&self) -> Result<()>;
}
