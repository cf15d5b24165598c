//! In-process broker for tests and single-process deployments.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::broker::{Delivery, MessageBroker, Subscription};
use crate::error::{BrokerError, Result};
use crate::topology::{Topology, pattern_matches};

#[derive(Debug, Clone)]
struct QueuedMessage {
    routing_key: String,
    body: Vec<u8>,
    redelivered: bool,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<QueuedMessage>,
    unacked: HashMap<u64, QueuedMessage>,
    dead_lettered: Vec<QueuedMessage>,
    notify: Arc<Notify>,
}

#[derive(Default)]
struct BrokerState {
    exchanges: HashMap<String, crate::topology::ExchangeSpec>,
    queues: HashMap<String, QueueState>,
    bindings: Vec<crate::topology::BindingSpec>,
    next_tag: u64,
    closed: bool,
}

/// In-process broker implementing topic-exchange semantics.
///
/// Carries the semantics the services depend on: topic pattern routing,
/// per-message ack, nack-without-requeue to a dead-letter buffer, one
/// in-flight message per queue, and redelivery of unacked messages after
/// [`InProcessBroker::recover`].
#[derive(Clone, Default)]
pub struct InProcessBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InProcessBroker {
    /// Creates a new broker with no declared topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages waiting in a queue.
    pub async fn queue_depth(&self, queue: &str) -> usize {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map(|q| q.ready.len())
            .unwrap_or(0)
    }

    /// Number of messages that followed the dead-letter path for a queue.
    pub async fn dead_letter_count(&self, queue: &str) -> usize {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map(|q| q.dead_lettered.len())
            .unwrap_or(0)
    }

    /// Returns unacked messages to the front of a queue, flagged as
    /// redelivered. Models the broker's behavior when a consumer dies
    /// without acknowledging.
    pub async fn recover(&self, queue: &str) {
        let mut state = self.state.lock().await;
        if let Some(q) = state.queues.get_mut(queue) {
            let mut tags: Vec<u64> = q.unacked.keys().copied().collect();
            tags.sort_unstable();
            for tag in tags.into_iter().rev() {
                if let Some(mut msg) = q.unacked.remove(&tag) {
                    msg.redelivered = true;
                    q.ready.push_front(msg);
                }
            }
            q.notify.notify_one();
        }
    }
}

#[async_trait]
impl MessageBroker for InProcessBroker {
    async fn declare_topology(&self, topology: &Topology) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(BrokerError::Closed);
        }

        for exchange in &topology.exchanges {
            if let Some(existing) = state.exchanges.get(&exchange.name)
                && existing.kind != exchange.kind
            {
                return Err(BrokerError::TopologyConflict(format!(
                    "exchange '{}' already declared with a different kind",
                    exchange.name
                )));
            }
            state
                .exchanges
                .insert(exchange.name.clone(), exchange.clone());
        }

        for queue in &topology.queues {
            state.queues.entry(queue.name.clone()).or_default();
        }

        for binding in &topology.bindings {
            if !state.bindings.contains(binding) {
                state.bindings.push(binding.clone());
            }
        }

        tracing::debug!(
            exchanges = topology.exchanges.len(),
            queues = topology.queues.len(),
            bindings = topology.bindings.len(),
            "topology declared"
        );

        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
        _persistent: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(BrokerError::Closed);
        }
        if !state.exchanges.contains_key(exchange) {
            return Err(BrokerError::UnknownExchange(exchange.to_string()));
        }

        let targets: Vec<String> = state
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange && pattern_matches(&b.routing_key, routing_key))
            .map(|b| b.queue.clone())
            .collect();

        if targets.is_empty() {
            metrics::counter!("broker_messages_unroutable").increment(1);
            tracing::debug!(%routing_key, "no binding matched; message dropped");
            return Ok(());
        }

        let message = QueuedMessage {
            routing_key: routing_key.to_string(),
            body,
            redelivered: false,
        };
        for target in targets {
            if let Some(queue) = state.queues.get_mut(&target) {
                queue.ready.push_back(message.clone());
                queue.notify.notify_one();
            }
        }

        metrics::counter!("broker_messages_published").increment(1);
        Ok(())
    }

    async fn subscribe(&self, queue: &str) -> Result<Box<dyn Subscription>> {
        let state = self.state.lock().await;
        if !state.queues.contains_key(queue) {
            return Err(BrokerError::UnknownQueue(queue.to_string()));
        }

        Ok(Box::new(InProcessSubscription {
            state: Arc::clone(&self.state),
            queue: queue.to_string(),
        }))
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.closed = true;
        for queue in state.queues.values() {
            queue.notify.notify_waiters();
            queue.notify.notify_one();
        }
        tracing::info!("broker connection closed");
        Ok(())
    }
}

struct InProcessSubscription {
    state: Arc<Mutex<BrokerState>>,
    queue: String,
}

#[async_trait]
impl Subscription for InProcessSubscription {
    async fn next(&self) -> Option<Delivery> {
        loop {
            let notify = {
                let mut state = self.state.lock().await;
                let closed = state.closed;

                let deliverable = state
                    .queues
                    .get(&self.queue)
                    .map(|q| q.unacked.is_empty() && !q.ready.is_empty())
                    .unwrap_or(false);

                if deliverable {
                    state.next_tag += 1;
                    let tag = state.next_tag;
                    let Some(queue) = state.queues.get_mut(&self.queue) else {
                        return None;
                    };
                    let Some(message) = queue.ready.pop_front() else {
                        return None;
                    };
                    let delivery = Delivery {
                        delivery_tag: tag,
                        routing_key: message.routing_key.clone(),
                        body: message.body.clone(),
                        redelivered: message.redelivered,
                    };
                    queue.unacked.insert(tag, message);
                    return Some(delivery);
                }

                let drained = state
                    .queues
                    .get(&self.queue)
                    .map(|q| q.ready.is_empty() && q.unacked.is_empty())
                    .unwrap_or(true);
                if closed && drained {
                    return None;
                }

                match state.queues.get(&self.queue) {
                    Some(q) => Arc::clone(&q.notify),
                    None => return None,
                }
            };

            notify.notified().await;
        }
    }

    async fn ack(&self, delivery_tag: u64) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(queue) = state.queues.get_mut(&self.queue) else {
            return Err(BrokerError::UnknownQueue(self.queue.clone()));
        };
        if queue.unacked.remove(&delivery_tag).is_none() {
            return Err(BrokerError::UnknownDelivery(delivery_tag));
        }
        queue.notify.notify_one();
        Ok(())
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(queue) = state.queues.get_mut(&self.queue) else {
            return Err(BrokerError::UnknownQueue(self.queue.clone()));
        };
        let Some(mut message) = queue.unacked.remove(&delivery_tag) else {
            return Err(BrokerError::UnknownDelivery(delivery_tag));
        };

        if requeue {
            message.redelivered = true;
            queue.ready.push_front(message);
        } else {
            metrics::counter!("broker_messages_dead_lettered").increment(1);
            tracing::warn!(
                routing_key = %message.routing_key,
                "message dead-lettered after negative acknowledgment"
            );
            queue.dead_lettered.push(message);
        }
        queue.notify.notify_one();
        Ok(())
    }
}
