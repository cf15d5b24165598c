use broker::BrokerError;
use domain::RepositoryError;
use thiserror::Error;

/// Errors that can occur while consuming order events.
///
/// Any of these fails the message, which is then negatively acknowledged
/// without requeue. Anomalies that are expected data-skew (missing product,
/// missing order, insufficient local stock) are not errors — they are
/// logged and the message is dropped by acking it.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The message body was not a well-formed event.
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The event parsed but lacks a field its type requires.
    #[error("Missing field '{0}' in event payload")]
    MissingField(&'static str),

    /// The local projection storage failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// The messaging layer failed.
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),
}
