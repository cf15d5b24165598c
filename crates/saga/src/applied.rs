//! Applied-event tracking for idempotent consumption.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use domain::RepositoryError;
use tokio::sync::RwLock;

/// Tracks which event ids this projection has already applied.
///
/// The check-and-insert is atomic and happens before any stock delta, so
/// an at-least-once redelivery can never double-decrement or
/// double-restore.
#[async_trait]
pub trait AppliedEventLog: Send + Sync {
    /// Records the event id if it has not been seen. Returns true when the
    /// id was newly recorded; false means the event was already applied.
    async fn mark_if_new(&self, event_id: &str) -> Result<bool, RepositoryError>;

    /// Returns true if the event id has been recorded.
    async fn contains(&self, event_id: &str) -> Result<bool, RepositoryError>;
}

/// In-memory applied-event log.
#[derive(Clone, Default)]
pub struct InMemoryAppliedEventLog {
    seen: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryAppliedEventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded event ids.
    pub async fn len(&self) -> usize {
        self.seen.read().await.len()
    }

    /// Returns true if no event ids have been recorded.
    pub async fn is_empty(&self) -> bool {
        self.seen.read().await.is_empty()
    }
}

#[async_trait]
impl AppliedEventLog for InMemoryAppliedEventLog {
    async fn mark_if_new(&self, event_id: &str) -> Result<bool, RepositoryError> {
        let mut seen = self.seen.write().await;
        Ok(seen.insert(event_id.to_string()))
    }

    async fn contains(&self, event_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.seen.read().await.contains(event_id))
    }
}
