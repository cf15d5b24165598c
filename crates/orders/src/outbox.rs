//! Outbox staging and relay.
//!
//! The command path stages a fully built envelope (stable event id) next to
//! the event-store append; the relay publishes staged envelopes to the
//! broker afterwards and marks them published. A publish failure leaves the
//! entry staged, so the next drain retries it — at-least-once from the
//! command side, paired with the consumer's idempotent application.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use broker::{Envelope, EventPublisher};
use domain::RepositoryError;
use tokio::sync::{RwLock, watch};

use crate::error::OrderError;

/// How many staged events one drain pass publishes at most.
const DRAIN_BATCH: usize = 100;

/// A staged event awaiting publication.
#[derive(Debug, Clone)]
pub struct StagedEvent {
    /// Outbox-assigned sequence, ascending in staging order.
    pub sequence: u64,

    /// The envelope to publish, with its pre-generated event id.
    pub envelope: Envelope,
}

/// Storage for staged events.
///
/// Entries leave the outbox only through `mark_published`; FIFO order is
/// preserved so the broker sees events in the order commands accepted them.
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Stages an envelope for publication.
    async fn stage(&self, envelope: Envelope) -> Result<(), RepositoryError>;

    /// Returns up to `limit` staged events, oldest first.
    async fn pending(&self, limit: usize) -> Result<Vec<StagedEvent>, RepositoryError>;

    /// Removes a published entry.
    async fn mark_published(&self, sequence: u64) -> Result<(), RepositoryError>;
}

#[derive(Default)]
struct OutboxState {
    staged: VecDeque<StagedEvent>,
    next_sequence: u64,
}

/// In-memory outbox.
#[derive(Clone, Default)]
pub struct InMemoryOutbox {
    state: Arc<RwLock<OutboxState>>,
}

impl InMemoryOutbox {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of staged, not-yet-published events.
    pub async fn pending_count(&self) -> usize {
        self.state.read().await.staged.len()
    }
}

#[async_trait]
impl Outbox for InMemoryOutbox {
    async fn stage(&self, envelope: Envelope) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.next_sequence += 1;
        let sequence = state.next_sequence;
        state.staged.push_back(StagedEvent { sequence, envelope });
        Ok(())
    }

    async fn pending(&self, limit: usize) -> Result<Vec<StagedEvent>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.staged.iter().take(limit).cloned().collect())
    }

    async fn mark_published(&self, sequence: u64) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.staged.retain(|e| e.sequence != sequence);
        Ok(())
    }
}

/// Publishes staged events to the broker.
///
/// `drain` stops at the first publish failure, leaving the failed entry and
/// everything after it staged; the periodic `run` loop picks them up again,
/// and the publisher's connection resource applies its own
/// reconnect-with-backoff underneath.
pub struct OutboxRelay<X: Outbox> {
    outbox: X,
    publisher: EventPublisher,
    poll_interval: Duration,
}

impl<X: Outbox> OutboxRelay<X> {
    /// Creates a relay with the default poll interval.
    pub fn new(outbox: X, publisher: EventPublisher) -> Self {
        Self {
            outbox,
            publisher,
            poll_interval: Duration::from_millis(50),
        }
    }

    /// Overrides the poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Publishes staged events, oldest first. Returns how many were
    /// published and marked.
    #[tracing::instrument(skip(self))]
    pub async fn drain(&self) -> Result<usize, OrderError> {
        let staged = self.outbox.pending(DRAIN_BATCH).await?;
        let mut published = 0;

        for entry in staged {
            self.publisher.publish_envelope(&entry.envelope).await?;
            self.outbox.mark_published(entry.sequence).await?;
            metrics::counter!("outbox_events_published").increment(1);
            published += 1;
        }

        Ok(published)
    }

    /// Drains the outbox on an interval until shutdown is signalled, then
    /// makes a final pass.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.drain().await {
                        tracing::warn!(error = %e, "outbox drain failed; staged events retained");
                    }
                }
            }
        }

        if let Err(e) = self.drain().await {
            tracing::warn!(error = %e, "final outbox drain failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker::{
        Connection, InProcessBroker, MessageBroker, ORDER_EVENTS_QUEUE, RetryPolicy, Topology,
    };

    fn relay_over(broker: InProcessBroker, outbox: InMemoryOutbox) -> OutboxRelay<InMemoryOutbox> {
        let conn = Connection::with_policy(
            Arc::new(broker),
            Topology::storefront(),
            RetryPolicy::no_retries(),
        );
        OutboxRelay::new(outbox, EventPublisher::new(Arc::new(conn)))
    }

    fn placed_envelope(order_id: i64) -> Envelope {
        Envelope::new(
            "order.placed",
            serde_json::json!({"orderId": order_id, "status": "pending"}),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn drain_publishes_and_unstages() {
        let broker = InProcessBroker::new();
        let outbox = InMemoryOutbox::new();
        outbox.stage(placed_envelope(1)).await.unwrap();
        outbox.stage(placed_envelope(2)).await.unwrap();

        let relay = relay_over(broker.clone(), outbox.clone());
        let published = relay.drain().await.unwrap();

        assert_eq!(published, 2);
        assert_eq!(outbox.pending_count().await, 0);
        assert_eq!(broker.queue_depth(ORDER_EVENTS_QUEUE).await, 2);
    }

    #[tokio::test]
    async fn drain_on_empty_outbox_is_noop() {
        let relay = relay_over(InProcessBroker::new(), InMemoryOutbox::new());
        assert_eq!(relay.drain().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_publish_retains_staged_events() {
        let broker = InProcessBroker::new();
        broker.close().await.unwrap();

        let outbox = InMemoryOutbox::new();
        outbox.stage(placed_envelope(1)).await.unwrap();

        let relay = relay_over(broker, outbox.clone());
        let result = relay.drain().await;

        assert!(result.is_err());
        assert_eq!(outbox.pending_count().await, 1);
    }

    #[tokio::test]
    async fn staged_event_ids_stay_stable_across_retries() {
        let outbox = InMemoryOutbox::new();
        let envelope = placed_envelope(1);
        let event_id = envelope.event_id.clone();
        outbox.stage(envelope).await.unwrap();

        // First relay attempt fails; the entry stays staged.
        let closed = InProcessBroker::new();
        closed.close().await.unwrap();
        let failing = relay_over(closed, outbox.clone());
        assert!(failing.drain().await.is_err());

        // Second attempt against a healthy broker delivers the same id.
        let broker = InProcessBroker::new();
        let relay = relay_over(broker.clone(), outbox.clone());
        relay.drain().await.unwrap();

        let sub = broker.subscribe(ORDER_EVENTS_QUEUE).await.unwrap();
        let delivery = sub.next().await.unwrap();
        let (delivered_id, _, _) = Envelope::parse_body(&delivery.body).unwrap();
        assert_eq!(delivered_id, event_id);
    }

    #[tokio::test]
    async fn run_drains_until_shutdown() {
        let broker = InProcessBroker::new();
        let outbox = InMemoryOutbox::new();
        outbox.stage(placed_envelope(1)).await.unwrap();

        let relay = Arc::new(
            relay_over(broker.clone(), outbox.clone())
                .with_poll_interval(Duration::from_millis(5)),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let relay_task = {
            let relay = Arc::clone(&relay);
            tokio::spawn(async move { relay.run(shutdown_rx).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        outbox.stage(placed_envelope(2)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        shutdown_tx.send(true).unwrap();
        relay_task.await.unwrap();

        assert_eq!(outbox.pending_count().await, 0);
        assert_eq!(broker.queue_depth(ORDER_EVENTS_QUEUE).await, 2);
    }
}
