//! Single-reminder endpoints under `/api/v1/reminders`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use carecall_core::{parse_timestamp, Reminder, ReminderOutcome, ScheduleReminderRequest};

use super::{json_body, parse_id};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OutcomeBody {
    pub outcome: String,
    /// Required when `outcome` is `delayed`.
    #[serde(default)]
    pub reschedule_time: Option<String>,
    #[serde(default, alias = "reason")]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleBody {
    pub scheduled_time: String,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(alias = "error_message")]
    pub message: String,
}

pub async fn create_reminder(
    State(state): State<AppState>,
    payload: Result<Json<ScheduleReminderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;
    let id = state.engine.schedule(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "id": id })),
    ))
}

pub async fn get_reminder(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Reminder>, ApiError> {
    let reminder = state.engine.get(parse_id(&id)?).await?;
    Ok(Json(reminder))
}

pub async fn delete_reminder(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.engine.cancel(parse_id(&id)?).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn record_outcome(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<OutcomeBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let body = json_body(payload)?;

    let outcome: ReminderOutcome = body.outcome.parse()?;
    let reschedule_time = body
        .reschedule_time
        .as_deref()
        .map(parse_timestamp)
        .transpose()?;

    let reminder = state
        .engine
        .record_outcome(id, outcome, reschedule_time, body.note)
        .await?;
    Ok(Json(json!({ "success": true, "reminder": reminder })))
}

pub async fn reschedule_reminder(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RescheduleBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let body = json_body(payload)?;
    let new_time = parse_timestamp(&body.scheduled_time)?;

    let reminder = state.engine.reschedule(id, new_time).await?;
    Ok(Json(json!({ "success": true, "reminder": reminder })))
}

pub async fn mark_reminder_error(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ErrorBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let body = json_body(payload)?;

    let reminder = state.engine.mark_error(id, body.message).await?;
    Ok(Json(json!({ "success": true, "reminder": reminder })))
}
