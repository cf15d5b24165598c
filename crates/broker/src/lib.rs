//! Messaging layer for the storefront services.
//!
//! Publishers and consumers are decoupled through a durable topic exchange:
//! the command side publishes order events with routing keys like
//! `order.placed`, and any queue bound with a matching pattern receives
//! them. Delivery is at-least-once; consumers acknowledge per message and
//! negative acknowledgments without requeue follow the dead-letter path.
//!
//! The broker itself sits behind the [`MessageBroker`] trait. The in-process
//! implementation in this crate carries the full wire contract (exchange and
//! queue names, binding pattern, envelope JSON, persistence flag,
//! ack/nack/dead-letter, redelivery), so a client-backed implementation can
//! be swapped in without touching publishers or consumers.

pub mod broker;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod publisher;
pub mod retry;
pub mod topology;

pub use broker::{Delivery, MessageBroker, Subscription};
pub use connection::Connection;
pub use envelope::Envelope;
pub use error::{BrokerError, Result};
pub use memory::InProcessBroker;
pub use publisher::EventPublisher;
pub use retry::RetryPolicy;
pub use topology::{
    BindingSpec, EVENTS_EXCHANGE, ExchangeKind, ExchangeSpec, ORDER_EVENTS_BINDING,
    ORDER_EVENTS_QUEUE, QueueSpec, Topology, pattern_matches,
};
