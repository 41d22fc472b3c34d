use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use carecall_core::{ReminderQuery, ReminderStore};

use crate::state::AppState;

/// Liveness plus a one-row read from the reminder store.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let check = state
        .engine
        .store()
        .query(ReminderQuery::new().limit(1))
        .await;

    match check {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "store": state.store_backend.as_str(),
                "version": env!("CARGO_PKG_VERSION"),
            })),
        ),
        Err(e) => {
            tracing::warn!(subsystem = "api", error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "degraded",
                    "store": state.store_backend.as_str(),
                    "error": e.to_string(),
                })),
            )
        }
    }
}
