//! Owned broker connection resource.
//!
//! Replaces ad-hoc "is the channel there yet" checks with an explicitly
//! owned resource: lazily established on first use, reconnect-with-backoff
//! on failure, readiness observable through a watch channel, and released
//! on shutdown.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};

use crate::broker::MessageBroker;
use crate::error::{BrokerError, Result};
use crate::retry::RetryPolicy;
use crate::topology::Topology;

/// A lazily-initialized connection to the broker.
///
/// `ensure_open` declares the topology on first use (idempotently), retrying
/// with backoff per the policy; once it succeeds, dependents observing
/// [`Connection::ready`] see `true`. [`Connection::close`] releases the
/// underlying broker connection and flips readiness back to `false`.
pub struct Connection {
    broker: Arc<dyn MessageBroker>,
    topology: Topology,
    policy: RetryPolicy,
    established: Mutex<bool>,
    ready_tx: watch::Sender<bool>,
}

impl Connection {
    /// Creates a connection resource with the default retry policy.
    pub fn new(broker: Arc<dyn MessageBroker>, topology: Topology) -> Self {
        Self::with_policy(broker, topology, RetryPolicy::default())
    }

    /// Creates a connection resource with an explicit retry policy.
    pub fn with_policy(
        broker: Arc<dyn MessageBroker>,
        topology: Topology,
        policy: RetryPolicy,
    ) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            broker,
            topology,
            policy,
            established: Mutex::new(false),
            ready_tx,
        }
    }

    /// Establishes the connection and declares the topology if not already
    /// done. Retries with backoff; a broker that stays unreachable past the
    /// retry budget surfaces as [`BrokerError::Unavailable`].
    pub async fn ensure_open(&self) -> Result<()> {
        let mut established = self.established.lock().await;
        if *established {
            return Ok(());
        }

        let mut attempt = 0;
        loop {
            match self.broker.declare_topology(&self.topology).await {
                Ok(()) => {
                    *established = true;
                    let _ = self.ready_tx.send(true);
                    tracing::info!("broker connection established");
                    return Ok(());
                }
                Err(e) if attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "broker connection failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(BrokerError::Unavailable(e.to_string()));
                }
            }
        }
    }

    /// Returns a receiver that observes readiness transitions.
    pub fn ready(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    /// Returns true if the connection is currently established.
    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// The broker behind this connection.
    pub fn broker(&self) -> &Arc<dyn MessageBroker> {
        &self.broker
    }

    /// Closes the underlying broker connection and drops readiness.
    pub async fn close(&self) -> Result<()> {
        let mut established = self.established.lock().await;
        *established = false;
        let _ = self.ready_tx.send(false);
        self.broker.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{Delivery, Subscription};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Broker double that fails the first N topology declarations.
    struct FlakyBroker {
        failures_left: AtomicUsize,
        declare_calls: AtomicUsize,
    }

    impl FlakyBroker {
        fn failing(times: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(times),
                declare_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MessageBroker for FlakyBroker {
        async fn declare_topology(&self, _topology: &Topology) -> Result<()> {
            self.declare_calls.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(BrokerError::Unavailable("connection refused".into()));
            }
            Ok(())
        }

        async fn publish(&self, _: &str, _: &str, _: Vec<u8>, _: bool) -> Result<()> {
            Ok(())
        }

        async fn subscribe(&self, _: &str) -> Result<Box<dyn Subscription>> {
            struct Never;
            #[async_trait]
            impl Subscription for Never {
                async fn next(&self) -> Option<Delivery> {
                    None
                }
                async fn ack(&self, _: u64) -> Result<()> {
                    Ok(())
                }
                async fn nack(&self, _: u64, _: bool) -> Result<()> {
                    Ok(())
                }
            }
            Ok(Box::new(Never))
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(max_retries)
            .with_initial_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn ensure_open_succeeds_and_signals_ready() {
        let broker = Arc::new(FlakyBroker::failing(0));
        let conn = Connection::with_policy(broker, Topology::storefront(), fast_policy(0));

        assert!(!conn.is_ready());
        conn.ensure_open().await.unwrap();
        assert!(conn.is_ready());
    }

    #[tokio::test]
    async fn ensure_open_retries_with_backoff() {
        let broker = Arc::new(FlakyBroker::failing(2));
        let conn =
            Connection::with_policy(Arc::clone(&broker) as _, Topology::storefront(), fast_policy(3));

        conn.ensure_open().await.unwrap();
        assert_eq!(broker.declare_calls.load(Ordering::SeqCst), 3);
        assert!(conn.is_ready());
    }

    #[tokio::test]
    async fn ensure_open_fails_past_retry_budget() {
        let broker = Arc::new(FlakyBroker::failing(10));
        let conn =
            Connection::with_policy(Arc::clone(&broker) as _, Topology::storefront(), fast_policy(2));

        let result = conn.ensure_open().await;
        assert!(matches!(result, Err(BrokerError::Unavailable(_))));
        assert!(!conn.is_ready());
        // First attempt plus two retries.
        assert_eq!(broker.declare_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn ensure_open_is_idempotent_once_established() {
        let broker = Arc::new(FlakyBroker::failing(0));
        let conn =
            Connection::with_policy(Arc::clone(&broker) as _, Topology::storefront(), fast_policy(0));

        conn.ensure_open().await.unwrap();
        conn.ensure_open().await.unwrap();
        assert_eq!(broker.declare_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_drops_readiness() {
        let broker = Arc::new(FlakyBroker::failing(0));
        let conn = Connection::with_policy(broker, Topology::storefront(), fast_policy(0));

        conn.ensure_open().await.unwrap();
        let mut ready = conn.ready();
        assert!(*ready.borrow_and_update());

        conn.close().await.unwrap();
        assert!(!conn.is_ready());
    }
}
