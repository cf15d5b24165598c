use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    EventRecord, EventStats, EventTypeCount, Result, StoredEvent,
    store::{
        ALL_EVENTS_LIMIT, EventStore, FILTERED_EVENTS_LIMIT, RANGE_EVENTS_LIMIT,
        RECENT_EVENTS_LIMIT,
    },
};

/// PostgreSQL-backed event store implementation.
///
/// The schema has no UPDATE or DELETE paths; the only statement that
/// touches rows is the INSERT in [`EventStore::record`].
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the events table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                event_id BIGSERIAL PRIMARY KEY,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT now(),
                type VARCHAR(50) NOT NULL,
                user_id BIGINT,
                product_id BIGINT,
                order_id BIGINT,
                data JSONB,
                aggregate_id VARCHAR(100),
                aggregate_type VARCHAR(50)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<StoredEvent> {
        Ok(StoredEvent {
            id: row.try_get("event_id")?,
            event_type: row.try_get("type")?,
            payload: row.try_get("data")?,
            user_id: row.try_get::<Option<i64>, _>("user_id")?.map(UserId::new),
            product_id: row
                .try_get::<Option<i64>, _>("product_id")?
                .map(ProductId::new),
            order_id: row.try_get::<Option<i64>, _>("order_id")?.map(OrderId::new),
            aggregate_id: row.try_get("aggregate_id")?,
            aggregate_type: row.try_get("aggregate_type")?,
            timestamp: row.try_get("timestamp")?,
        })
    }

    async fn fetch_newest_first(&self, limit: usize) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query("SELECT * FROM events ORDER BY timestamp DESC, event_id DESC LIMIT $1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn record(&self, record: EventRecord) -> Result<StoredEvent> {
        let row = sqlx::query(
            r#"
            INSERT INTO events (type, user_id, product_id, order_id, data, aggregate_id, aggregate_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&record.event_type)
        .bind(record.user_id.map(i64::from))
        .bind(record.product_id.map(i64::from))
        .bind(record.order_id.map(i64::from))
        .bind(&record.payload)
        .bind(&record.aggregate_id)
        .bind(&record.aggregate_type)
        .fetch_one(&self.pool)
        .await?;

        metrics::counter!("event_store_events_recorded").increment(1);

        Self::row_to_event(row)
    }

    async fn all_events(&self) -> Result<Vec<StoredEvent>> {
        self.fetch_newest_first(ALL_EVENTS_LIMIT).await
    }

    async fn events_by_type(&self, event_type: &str) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query(
            "SELECT * FROM events WHERE type = $1 ORDER BY timestamp DESC, event_id DESC LIMIT $2",
        )
        .bind(event_type)
        .bind(FILTERED_EVENTS_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn events_by_user(&self, user_id: UserId) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query(
            "SELECT * FROM events WHERE user_id = $1 ORDER BY timestamp DESC, event_id DESC LIMIT $2",
        )
        .bind(user_id.as_i64())
        .bind(FILTERED_EVENTS_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM events
            WHERE timestamp >= $1 AND timestamp <= $2
            ORDER BY timestamp DESC, event_id DESC
            LIMIT $3
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(RANGE_EVENTS_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn stats(&self) -> Result<EventStats> {
        let total_events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;

        let type_rows = sqlx::query(
            "SELECT type, COUNT(*) AS count FROM events GROUP BY type ORDER BY count DESC, type ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        let event_type_stats = type_rows
            .into_iter()
            .map(|row| {
                Ok(EventTypeCount {
                    event_type: row.try_get("type")?,
                    count: row.try_get::<i64, _>("count")? as u64,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let recent_events = self.fetch_newest_first(RECENT_EVENTS_LIMIT).await?;

        Ok(EventStats {
            total_events: total_events as u64,
            event_type_stats,
            recent_events,
        })
    }
}
