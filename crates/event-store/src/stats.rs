use serde::{Deserialize, Serialize};

use crate::StoredEvent;

/// Count of events of a single type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTypeCount {
    /// The event type tag.
    pub event_type: String,

    /// How many events of this type are stored.
    pub count: u64,
}

/// Aggregate statistics over the whole store.
///
/// `total_events` always equals the sum of the per-type counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStats {
    /// Total number of stored events.
    pub total_events: u64,

    /// Per-type counts, descending by count.
    pub event_type_stats: Vec<EventTypeCount>,

    /// The most recent events, newest first.
    pub recent_events: Vec<StoredEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_count_serialization() {
        let count = EventTypeCount {
            event_type: "order.placed".to_string(),
            count: 3,
        };
        let json = serde_json::to_value(&count).unwrap();
        assert_eq!(json["event_type"], "order.placed");
        assert_eq!(json["count"], 3);
    }
}
