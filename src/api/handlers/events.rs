use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use std::sync::Arc;

use super::submissions::CreatedResponse;
use crate::api::auth::RequireAdmin;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::events::{Event, EventForm, Registration, RegistrationForm, UPCOMING_LIMIT};
use crate::AppState;

// ============================================================================
// Public
// ============================================================================

pub async fn list_events(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<Vec<Event>>>, ApiError> {
    let events = state.events.upcoming(Utc::now(), UPCOMING_LIMIT).await?;
    Ok(JSend::success(events))
}

pub async fn register_for_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    AppJson(form): AppJson<RegistrationForm>,
) -> Result<(StatusCode, Json<JSend<CreatedResponse>>), ApiError> {
    let id = state.events.register(&event_id, &form).await?;
    Ok((StatusCode::CREATED, JSend::success(CreatedResponse { id })))
}

// ============================================================================
// Admin
// ============================================================================

pub async fn create_event(
    State(state): State<Arc<AppState>>,
    RequireAdmin(actor): RequireAdmin,
    AppJson(form): AppJson<EventForm>,
) -> Result<(StatusCode, Json<JSend<CreatedResponse>>), ApiError> {
    let id = state.events.create(&form).await?;
    tracing::info!(event_id = %id, operator = %actor.id, "Event created");
    Ok((StatusCode::CREATED, JSend::success(CreatedResponse { id })))
}

pub async fn list_event_registrations(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_): RequireAdmin,
    Path(event_id): Path<String>,
) -> Result<Json<JSend<Vec<Registration>>>, ApiError> {
    let registrations = state.events.registrations(&event_id).await?;
    Ok(JSend::success(registrations))
}
