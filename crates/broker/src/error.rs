use thiserror::Error;

/// Errors that can occur in the messaging layer.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker could not be reached or the connection could not be
    /// established within the retry budget. Commands must treat this as
    /// failure of the whole operation, never swallow it.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// Publishing referenced an exchange that has not been declared.
    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    /// Subscribing referenced a queue that has not been declared.
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    /// Acknowledgment referenced a delivery tag with no in-flight message.
    #[error("Unknown delivery tag: {0}")]
    UnknownDelivery(u64),

    /// Topology redeclaration conflicted with the existing declaration.
    #[error("Topology conflict: {0}")]
    TopologyConflict(String),

    /// The routing key was empty.
    #[error("Routing key must not be empty")]
    EmptyRoutingKey,

    /// The envelope payload was not a JSON object.
    #[error("Envelope payload must be a JSON object")]
    InvalidPayload,

    /// A serialization error occurred while building or parsing a message.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The broker connection has been closed.
    #[error("Broker connection closed")]
    Closed,
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
