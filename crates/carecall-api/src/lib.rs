//! carecall-api - HTTP surface for carecall reminders.
//!
//! The router is built here so integration tests exercise the same routes
//! and middleware as the binary.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};

pub use config::{ServerConfig, StoreBackend};
pub use error::ApiError;
pub use state::AppState;

use handlers::{
    health::health_check,
    reminders::{
        create_reminder, delete_reminder, get_reminder, mark_reminder_error, record_outcome,
        reschedule_reminder,
    },
    scheduler::check_pending,
    tools::{call_tool, list_tools},
    users::{home_summary, list_pending_reminders, list_user_reminders},
};

/// Time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = carecall_core::new_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// All routes with request tracing and `x-request-id` propagation.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Reminders
        .route("/api/v1/reminders", post(create_reminder))
        .route(
            "/api/v1/reminders/:id",
            get(get_reminder).delete(delete_reminder),
        )
        .route("/api/v1/reminders/:id/outcome", post(record_outcome))
        .route("/api/v1/reminders/:id/reschedule", post(reschedule_reminder))
        .route("/api/v1/reminders/:id/error", post(mark_reminder_error))
        // Per-user views
        .route("/api/v1/users/:user_id/reminders", get(list_user_reminders))
        .route(
            "/api/v1/users/:user_id/reminders/pending",
            get(list_pending_reminders),
        )
        .route("/api/v1/users/:user_id/home", get(home_summary))
        // Scheduler
        .route("/api/v1/scheduler/check-pending", post(check_pending))
        // Voice-session tools
        .route("/api/v1/tools", get(list_tools))
        .route("/api/v1/tools/:name", post(call_tool))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .with_state(state)
}
