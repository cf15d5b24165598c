//! The command-accepting order service.
//!
//! Every accepted command does three things: validates and mutates the
//! order aggregate, appends the resulting domain event to the event store,
//! and stages the event for publication. Publication itself runs
//! asynchronously from the staged record via the [`OutboxRelay`], so a
//! broker outage never leaves an accepted command without a durable event.

pub mod error;
pub mod outbox;
pub mod service;

pub use error::OrderError;
pub use outbox::{InMemoryOutbox, Outbox, OutboxRelay, StagedEvent};
pub use service::{OrderService, OrderSummary};
