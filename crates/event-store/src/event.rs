use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// A domain event as persisted in the store.
///
/// The store assigns `id` (a store-local sequence) and `timestamp` at
/// insertion. The payload carries the full event body, including the
/// service-generated event id; the correlation columns exist so events can
/// be queried by user, product, or order without opening the payload.
///
/// Stored events are immutable: nothing in this crate mutates a row after
/// insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Store-assigned sequence number (primary key).
    pub id: i64,

    /// The event type tag (e.g. "order.placed").
    pub event_type: String,

    /// The full event payload as JSON.
    pub payload: serde_json::Value,

    /// The user the event relates to, if any.
    pub user_id: Option<UserId>,

    /// The product the event relates to, if any.
    pub product_id: Option<ProductId>,

    /// The order the event relates to, if any.
    pub order_id: Option<OrderId>,

    /// Aggregate identity (e.g. "order-17").
    pub aggregate_id: Option<String>,

    /// Aggregate type (e.g. "order").
    pub aggregate_type: Option<String>,

    /// When the store accepted the event (assignment time, distinct from
    /// the publish timestamp carried in broker envelopes).
    pub timestamp: DateTime<Utc>,
}

/// A new event to be recorded, before the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub event_type: String,
    pub payload: serde_json::Value,
    pub user_id: Option<UserId>,
    pub product_id: Option<ProductId>,
    pub order_id: Option<OrderId>,
    pub aggregate_id: Option<String>,
    pub aggregate_type: Option<String>,
}

impl EventRecord {
    /// Creates a new event record builder.
    pub fn builder() -> EventRecordBuilder {
        EventRecordBuilder::default()
    }
}

/// Builder for constructing event records.
#[derive(Debug, Default)]
pub struct EventRecordBuilder {
    event_type: Option<String>,
    payload: Option<serde_json::Value>,
    user_id: Option<UserId>,
    product_id: Option<ProductId>,
    order_id: Option<OrderId>,
    aggregate_id: Option<String>,
    aggregate_type: Option<String>,
}

impl EventRecordBuilder {
    /// Sets the event type tag.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Correlates the event with a user.
    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Correlates the event with a product.
    pub fn product_id(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    /// Correlates the event with an order.
    pub fn order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    /// Sets the aggregate identity and type.
    pub fn aggregate(mut self, id: impl Into<String>, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_id = Some(id.into());
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Builds the event record.
    ///
    /// Fails if `event_type` or `payload` is missing.
    pub fn build(self) -> crate::Result<EventRecord> {
        let event_type = self
            .event_type
            .ok_or_else(|| crate::EventStoreError::InvalidRecord("event_type is required".into()))?;
        let payload = self
            .payload
            .ok_or_else(|| crate::EventStoreError::InvalidRecord("payload is required".into()))?;

        Ok(EventRecord {
            event_type,
            payload,
            user_id: self.user_id,
            product_id: self.product_id,
            order_id: self.order_id,
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_with_all_fields() {
        let record = EventRecord::builder()
            .event_type("order.placed")
            .payload(serde_json::json!({"orderId": 1}))
            .user_id(UserId::new(3))
            .product_id(ProductId::new(5))
            .order_id(OrderId::new(1))
            .aggregate("order-1", "order")
            .build()
            .unwrap();

        assert_eq!(record.event_type, "order.placed");
        assert_eq!(record.user_id, Some(UserId::new(3)));
        assert_eq!(record.product_id, Some(ProductId::new(5)));
        assert_eq!(record.order_id, Some(OrderId::new(1)));
        assert_eq!(record.aggregate_id.as_deref(), Some("order-1"));
        assert_eq!(record.aggregate_type.as_deref(), Some("order"));
    }

    #[test]
    fn builder_requires_event_type_and_payload() {
        let result = EventRecord::builder().build();
        assert!(result.is_err());

        let result = EventRecord::builder().event_type("order.placed").build();
        assert!(result.is_err());

        let result = EventRecord::builder()
            .event_type("order.placed")
            .payload(serde_json::json!({}))
            .build();
        assert!(result.is_ok());
    }
}
