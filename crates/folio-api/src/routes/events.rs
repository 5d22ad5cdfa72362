//! Routes for querying the event log.

use axum::extract::{Query, State};
use axum::{Json, Router, routing::get};
use chrono::{DateTime, Utc};
use folio_event_log::application::query_handlers::{self, EventLogView};
use serde::Deserialize;
use tracing::instrument;

use crate::error::ApiError;
use crate::state::EventLogState;

/// Query string for GET /range. Both bounds are inclusive RFC 3339
/// instants.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeParams {
    /// Earliest timestamp to include.
    pub start_date: DateTime<Utc>,
    /// Latest timestamp to include.
    pub end_date: DateTime<Utc>,
}

/// GET /
#[instrument(skip(state))]
async fn list_events(
    State(state): State<EventLogState>,
) -> Result<Json<Vec<EventLogView>>, ApiError> {
    let events = query_handlers::list_all_events(&*state.log_store).await?;
    Ok(Json(events))
}

/// GET /range
#[instrument(skip(state), fields(start = %params.start_date, end = %params.end_date))]
async fn list_events_in_range(
    State(state): State<EventLogState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<EventLogView>>, ApiError> {
    let events =
        query_handlers::list_events_by_range(params.start_date, params.end_date, &*state.log_store)
            .await?;
    Ok(Json(events))
}

/// Returns the router for the event log.
pub fn router() -> Router<EventLogState> {
    Router::new()
        .route("/", get(list_events))
        .route("/range", get(list_events_in_range))
}
