//! Show calendar: `GET /api/events` plus admin create/update/delete, each
//! broadcast as `calendar_update`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use livecart_core::time::parse_ts;
use livecart_core::types::CalendarEvent;
use livecart_protocol::frames::CalendarOp;
use livecart_store::{Collection, Filter, Repository, RepositoryExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::http::error::{ApiError, ApiResult};

const MAX_EVENTS: usize = 500;

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub title: String,
    pub starts_at: String,
    #[serde(default)]
    pub ends_at: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update; absent fields stay as they are.
#[derive(Debug, Default, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
    pub description: Option<String>,
}

/// GET /api/events: upcoming and past shows, by start time.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<CalendarEvent>>> {
    let mut events: Vec<CalendarEvent> =
        state.repo.list_as(Collection::Events, &Filter::new(), MAX_EVENTS)?;
    events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
    Ok(Json(events))
}

/// POST /api/admin/events
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EventRequest>,
) -> ApiResult<(StatusCode, Json<CalendarEvent>)> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::validation("title cannot be empty"));
    }
    check_ts("starts_at", &req.starts_at)?;
    if let Some(ends_at) = &req.ends_at {
        check_ts("ends_at", ends_at)?;
    }

    let event: CalendarEvent = state.repo.append_as(
        Collection::Events,
        &serde_json::json!({
            "title": title,
            "starts_at": req.starts_at,
            "ends_at": req.ends_at,
            "description": req.description,
        }),
    )?;
    state.publisher.publish_calendar(&event, CalendarOp::Created);
    Ok((StatusCode::CREATED, Json(event)))
}

/// PUT /api/admin/events/{id}
pub async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<EventPatch>,
) -> ApiResult<Json<CalendarEvent>> {
    let mut fields = Map::new();
    if let Some(title) = patch.title {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::validation("title cannot be empty"));
        }
        fields.insert("title".into(), Value::String(title));
    }
    if let Some(starts_at) = patch.starts_at {
        check_ts("starts_at", &starts_at)?;
        fields.insert("starts_at".into(), Value::String(starts_at));
    }
    if let Some(ends_at) = patch.ends_at {
        check_ts("ends_at", &ends_at)?;
        fields.insert("ends_at".into(), Value::String(ends_at));
    }
    if let Some(description) = patch.description {
        fields.insert("description".into(), Value::String(description));
    }
    if fields.is_empty() {
        return Err(ApiError::validation("nothing to update"));
    }

    let event: CalendarEvent =
        state
            .repo
            .update_as(Collection::Events, &id, Value::Object(fields))?;
    state.publisher.publish_calendar(&event, CalendarOp::Updated);
    Ok(Json(event))
}

/// DELETE /api/admin/events/{id}: the broadcast carries the removed record.
pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let event: CalendarEvent = state
        .repo
        .get_as(Collection::Events, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("event {id} not found")))?;
    state.repo.delete(Collection::Events, &id)?;
    state.publisher.publish_calendar(&event, CalendarOp::Deleted);
    Ok(StatusCode::NO_CONTENT)
}

fn check_ts(field: &str, value: &str) -> ApiResult<()> {
    parse_ts(value)
        .map(|_| ())
        .map_err(|_| ApiError::validation(format!("{field} must be an ISO-8601 timestamp")))
}
