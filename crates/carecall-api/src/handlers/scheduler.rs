use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use carecall_core::format_timestamp;

use crate::error::ApiError;
use crate::state::AppState;

/// Run one due-scan sweep now. Safe to call alongside the background worker.
pub async fn check_pending(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let report = state.scanner.sweep_now().await?;
    Ok(Json(json!({
        "success": true,
        "triggered": report.triggered,
        "skipped": report.skipped,
        "failed": report.failed,
        "reminder_ids": report.triggered_ids,
        "timestamp": format_timestamp(&report.swept_at),
    })))
}
