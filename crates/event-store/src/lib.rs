//! Append-only event store for the storefront.
//!
//! Every accepted command produces exactly one domain event, recorded here
//! for audit and analytics. The store is append-only: no update or delete
//! operation exists on it. Queries are bounded by fixed page sizes to
//! protect the store from unbounded scans.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod stats;
pub mod store;

pub use error::{EventStoreError, Result};
pub use event::{EventRecord, EventRecordBuilder, StoredEvent};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use stats::{EventStats, EventTypeCount};
pub use store::{
    ALL_EVENTS_LIMIT, EventStore, FILTERED_EVENTS_LIMIT, RANGE_EVENTS_LIMIT, RECENT_EVENTS_LIMIT,
};
