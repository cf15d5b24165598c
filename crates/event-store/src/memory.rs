use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::UserId;
use tokio::sync::RwLock;

use crate::{
    EventRecord, EventStats, EventTypeCount, Result, StoredEvent,
    store::{
        ALL_EVENTS_LIMIT, EventStore, FILTERED_EVENTS_LIMIT, RANGE_EVENTS_LIMIT,
        RECENT_EVENTS_LIMIT,
    },
};

/// In-memory event store implementation.
///
/// Stores all events in memory and provides the same interface as the
/// PostgreSQL implementation. Used in tests and single-process deployments.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    fn newest_first(mut events: Vec<StoredEvent>, limit: usize) -> Vec<StoredEvent> {
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        events.truncate(limit);
        events
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn record(&self, record: EventRecord) -> Result<StoredEvent> {
        let mut events = self.events.write().await;

        let stored = StoredEvent {
            id: events.len() as i64 + 1,
            event_type: record.event_type,
            payload: record.payload,
            user_id: record.user_id,
            product_id: record.product_id,
            order_id: record.order_id,
            aggregate_id: record.aggregate_id,
            aggregate_type: record.aggregate_type,
            timestamp: Utc::now(),
        };
        events.push(stored.clone());

        metrics::counter!("event_store_events_recorded").increment(1);
        tracing::debug!(event_type = %stored.event_type, id = stored.id, "event recorded");

        Ok(stored)
    }

    async fn all_events(&self) -> Result<Vec<StoredEvent>> {
        let events = self.events.read().await.clone();
        Ok(Self::newest_first(events, ALL_EVENTS_LIMIT))
    }

    async fn events_by_type(&self, event_type: &str) -> Result<Vec<StoredEvent>> {
        let events: Vec<_> = self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect();
        Ok(Self::newest_first(events, FILTERED_EVENTS_LIMIT))
    }

    async fn events_by_user(&self, user_id: UserId) -> Result<Vec<StoredEvent>> {
        let events: Vec<_> = self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.user_id == Some(user_id))
            .cloned()
            .collect();
        Ok(Self::newest_first(events, FILTERED_EVENTS_LIMIT))
    }

    async fn events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>> {
        let events: Vec<_> = self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .cloned()
            .collect();
        Ok(Self::newest_first(events, RANGE_EVENTS_LIMIT))
    }

    async fn stats(&self) -> Result<EventStats> {
        let events = self.events.read().await.clone();

        let total_events = events.len() as u64;

        let mut counts: HashMap<String, u64> = HashMap::new();
        for event in &events {
            *counts.entry(event.event_type.clone()).or_insert(0) += 1;
        }
        let mut event_type_stats: Vec<EventTypeCount> = counts
            .into_iter()
            .map(|(event_type, count)| EventTypeCount { event_type, count })
            .collect();
        event_type_stats.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.event_type.cmp(&b.event_type))
        });

        let recent_events = Self::newest_first(events, RECENT_EVENTS_LIMIT);

        Ok(EventStats {
            total_events,
            event_type_stats,
            recent_events,
        })
    }
}
