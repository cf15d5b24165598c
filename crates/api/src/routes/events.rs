//! Event store query surface.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use common::UserId;
use event_store::{EventStats, EventStore, StoredEvent};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::orders::AppState;

#[derive(Serialize)]
pub struct EventListResponse {
    pub total: usize,
    pub events: Vec<StoredEvent>,
}

#[derive(Serialize)]
pub struct EventsByTypeResponse {
    #[serde(rename = "type")]
    pub event_type: String,
    pub total: usize,
    pub events: Vec<StoredEvent>,
}

#[derive(Serialize)]
pub struct EventsByUserResponse {
    pub user_id: i64,
    pub total: usize,
    pub events: Vec<StoredEvent>,
}

#[derive(Serialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct EventsByRangeResponse {
    pub date_range: DateRange,
    pub total: usize,
    pub events: Vec<StoredEvent>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start_date: String,
    pub end_date: String,
}

/// GET /events — all events, newest first, bounded.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<EventListResponse>, ApiError> {
    let events = state.event_store.all_events().await?;
    Ok(Json(EventListResponse {
        total: events.len(),
        events,
    }))
}

/// GET /events/stats — aggregate statistics.
#[tracing::instrument(skip(state))]
pub async fn stats<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<EventStats>, ApiError> {
    Ok(Json(state.event_store.stats().await?))
}

/// GET /events/type/{type} — events of one type, newest first, bounded.
#[tracing::instrument(skip(state))]
pub async fn by_type<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(event_type): Path<String>,
) -> Result<Json<EventsByTypeResponse>, ApiError> {
    let events = state.event_store.events_by_type(&event_type).await?;
    Ok(Json(EventsByTypeResponse {
        event_type,
        total: events.len(),
        events,
    }))
}

/// GET /events/user/{user_id} — events for one user, newest first, bounded.
#[tracing::instrument(skip(state))]
pub async fn by_user<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<i64>,
) -> Result<Json<EventsByUserResponse>, ApiError> {
    let events = state
        .event_store
        .events_by_user(UserId::new(user_id))
        .await?;
    Ok(Json(EventsByUserResponse {
        user_id,
        total: events.len(),
        events,
    }))
}

/// GET /events/range?start_date=&end_date= — events in an inclusive
/// timestamp range, newest first, bounded.
#[tracing::instrument(skip(state))]
pub async fn by_range<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<EventsByRangeResponse>, ApiError> {
    let start = parse_timestamp(&query.start_date)?;
    let end = parse_timestamp(&query.end_date)?;

    let events = state.event_store.events_in_range(start, end).await?;
    Ok(Json(EventsByRangeResponse {
        date_range: DateRange { start, end },
        total: events.len(),
        events,
    }))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ApiError::BadRequest(format!("Invalid timestamp '{raw}': {e}")))
}
