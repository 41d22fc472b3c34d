//! Error types for carecall.

use thiserror::Error;
use uuid::Uuid;

use crate::models::ReminderStatus;

/// Result type alias using carecall's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for carecall operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed timestamp, missing required field, bad argument.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The requested transition is not legal from the record's current status.
    #[error("Invalid transition for reminder {id}: {from} -> {to}")]
    InvalidTransition {
        id: Uuid,
        from: ReminderStatus,
        to: ReminderStatus,
    },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The persistence collaborator cannot be reached or failed.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a reminder that does not exist.
    pub fn reminder_not_found(id: Uuid) -> Self {
        Error::NotFound(format!("Reminder {} not found", id))
    }

    /// Whether a caller may reasonably retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }

    /// Whether this is a lost race or illegal edge rather than a fault.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Error::InvalidTransition { .. })
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::NotFound(_) => "not_found",
            Error::StoreUnavailable(_) => "store_unavailable",
            Error::Serialization(_) => "serialization",
            Error::Config(_) => "config",
            Error::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Error::NotFound("Row not found".to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Error::Serialization(e.to_string())
            }
            // Pool timeouts, IO, TLS, protocol and server-side errors all mean
            // the store could not complete the request.
            other => Error::StoreUnavailable(other.to_string()),
        }
    }
}
