//! Per-user listings under `/api/v1/users/:user_id`.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use carecall_core::ReminderStatus;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Status name; empty or `all` means no filter.
    #[serde(default)]
    pub status: Option<String>,
}

impl ListParams {
    fn status(&self) -> Result<Option<ReminderStatus>, ApiError> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => Ok(None),
            Some(raw) => Ok(Some(raw.parse()?)),
        }
    }
}

pub async fn list_user_reminders(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let reminders = state
        .queries
        .list_by_user(&user_id, params.status()?)
        .await?;
    Ok(Json(json!({ "success": true, "reminders": reminders })))
}

pub async fn list_pending_reminders(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let reminders = state.queries.list_pending(&user_id).await?;
    Ok(Json(json!({ "success": true, "reminders": reminders })))
}

/// Pending count and the soonest pending reminder, for the user's home screen.
pub async fn home_summary(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let pending_reminders = state.queries.pending_count(&user_id).await?;
    let next_reminder = state.queries.next_pending(&user_id).await?;
    Ok(Json(json!({
        "success": true,
        "pending_reminders": pending_reminders,
        "next_reminder": next_reminder,
    })))
}
