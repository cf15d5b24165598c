use thiserror::Error;

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The record was missing required fields.
    #[error("Invalid event record: {0}")]
    InvalidRecord(String),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
