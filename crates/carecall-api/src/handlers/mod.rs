//! Route handlers, grouped by resource.

pub mod health;
pub mod reminders;
pub mod scheduler;
pub mod tools;
pub mod users;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use uuid::Uuid;

use crate::error::ApiError;

/// Unwrap a JSON body, turning axum's plain-text rejection into an [`ApiError`].
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::BadRequest(format!("Invalid reminder id: {}", raw)))
}
