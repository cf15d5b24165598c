//! Order saga consumer.
//!
//! Subscribes to the `order.events` queue and applies each event to the
//! consumer side's own stock and order projections: placements decrement
//! stock, payments complete mirrored orders, cancellations restore stock.
//! Processing is sequential with a single in-flight message; handler
//! success acks, handler failure dead-letters without requeue.
//!
//! Delivery is at-least-once, so every stock delta is guarded by an
//! applied-event-id check — redelivering the same event is a no-op.

pub mod applied;
pub mod consumer;
pub mod error;

pub use applied::{AppliedEventLog, InMemoryAppliedEventLog};
pub use consumer::{OrderEventConsumer, run_consumer};
pub use error::ConsumerError;
