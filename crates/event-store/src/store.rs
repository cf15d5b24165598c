use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::UserId;

use crate::{EventRecord, EventStats, Result, StoredEvent};

/// Maximum events returned by the full listing.
pub const ALL_EVENTS_LIMIT: usize = 1000;

/// Maximum events returned by the by-type and by-user listings.
pub const FILTERED_EVENTS_LIMIT: usize = 500;

/// Maximum events returned by the timestamp-range listing.
pub const RANGE_EVENTS_LIMIT: usize = 1000;

/// Number of recent events included in statistics.
pub const RECENT_EVENTS_LIMIT: usize = 10;

/// Core trait for event store implementations.
///
/// The store is append-only: `record` is the only mutating operation, and
/// it only ever inserts. All query operations return events newest-first
/// and are bounded by the fixed limits above — callers cannot request
/// unbounded result sets.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persists one immutable event, returning it with the store-assigned
    /// id and timestamp.
    async fn record(&self, record: EventRecord) -> Result<StoredEvent>;

    /// Returns stored events, newest first, bounded by [`ALL_EVENTS_LIMIT`].
    async fn all_events(&self) -> Result<Vec<StoredEvent>>;

    /// Returns events of one type, newest first, bounded by
    /// [`FILTERED_EVENTS_LIMIT`].
    async fn events_by_type(&self, event_type: &str) -> Result<Vec<StoredEvent>>;

    /// Returns events correlated with one user, newest first, bounded by
    /// [`FILTERED_EVENTS_LIMIT`].
    async fn events_by_user(&self, user_id: UserId) -> Result<Vec<StoredEvent>>;

    /// Returns events within an inclusive timestamp range, newest first,
    /// bounded by [`RANGE_EVENTS_LIMIT`].
    async fn events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>>;

    /// Returns aggregate statistics: total count, per-type counts
    /// (descending by count), and the [`RECENT_EVENTS_LIMIT`] most recent
    /// events.
    async fn stats(&self) -> Result<EventStats>;
}
