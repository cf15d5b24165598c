//! Wire envelope for published events.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{BrokerError, Result};

/// The wire envelope around an event payload.
///
/// The serialized body is the payload object with two fields added at
/// envelope-construction time: a generated `eventId` and an ISO-8601
/// `timestamp`. The envelope timestamp is publish time; it is distinct from
/// the event store's timestamp, which is assignment time.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub routing_key: String,
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Map<String, Value>,
}

impl Envelope {
    /// Builds an envelope around a payload, generating the event id and
    /// stamping the current time.
    ///
    /// Fails on an empty routing key or a payload that is not a JSON
    /// object.
    pub fn new(routing_key: &str, payload: Value) -> Result<Self> {
        if routing_key.is_empty() {
            return Err(BrokerError::EmptyRoutingKey);
        }
        let Value::Object(payload) = payload else {
            return Err(BrokerError::InvalidPayload);
        };

        let timestamp = Utc::now();
        Ok(Self {
            event_id: generate_event_id(routing_key, timestamp),
            routing_key: routing_key.to_string(),
            timestamp,
            payload,
        })
    }

    /// Reconstructs an envelope from previously staged parts (e.g. an
    /// outbox row). The event id stays stable across republish attempts.
    pub fn from_parts(
        routing_key: impl Into<String>,
        event_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            routing_key: routing_key.into(),
            event_id: event_id.into(),
            timestamp,
            payload,
        }
    }

    /// Serializes the wire body: payload fields plus `eventId` and
    /// `timestamp`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut body = self.payload.clone();
        body.insert("eventId".to_string(), Value::String(self.event_id.clone()));
        body.insert(
            "timestamp".to_string(),
            Value::String(self.timestamp.to_rfc3339()),
        );
        Ok(serde_json::to_vec(&Value::Object(body))?)
    }

    /// Parses a wire body back into (event id, timestamp, payload).
    pub fn parse_body(body: &[u8]) -> Result<(String, String, Map<String, Value>)> {
        let value: Value = serde_json::from_slice(body)?;
        let Value::Object(mut fields) = value else {
            return Err(BrokerError::InvalidPayload);
        };

        let event_id = match fields.remove("eventId") {
            Some(Value::String(id)) => id,
            _ => return Err(BrokerError::InvalidPayload),
        };
        let timestamp = match fields.remove("timestamp") {
            Some(Value::String(ts)) => ts,
            _ => return Err(BrokerError::InvalidPayload),
        };

        Ok((event_id, timestamp, fields))
    }
}

/// Generates a service-local event id: routing key, publish millis, and a
/// random suffix.
fn generate_event_id(routing_key: &str, timestamp: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{routing_key}-{}-{}",
        timestamp.timestamp_millis(),
        &suffix[..9]
    )
}
