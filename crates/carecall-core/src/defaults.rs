//! Centralized default constants for carecall.
//!
//! Every crate references these constants instead of defining its own
//! magic numbers. Organized by domain area.

// =============================================================================
// SWEEP
// =============================================================================

/// Seconds between due-scan sweeps.
pub const SWEEP_INTERVAL_SECS: u64 = 300;

/// Reminders triggered concurrently within one sweep.
pub const SWEEP_MAX_CONCURRENT: usize = 8;

/// Capacity of the sweep worker's broadcast event channel.
pub const SWEEP_EVENT_CAPACITY: usize = 100;

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Compare-and-swap retries when a status shifts under `mark_error` or
/// `reschedule`.
pub const CAS_MAX_RETRIES: usize = 3;

/// Default callback delay for the `reschedule` tool when none is given.
pub const RESCHEDULE_DELAY_MINUTES: i64 = 30;

/// Longest callback delay the `reschedule` tool accepts (one week).
pub const RESCHEDULE_MAX_DELAY_MINUTES: i64 = 7 * 24 * 60;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP listen port.
pub const SERVER_PORT: u16 = 3000;

/// Default HTTP bind address.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Database used when `DATABASE_URL` is unset.
pub const DATABASE_URL: &str = "postgres://localhost/carecall";

/// Default database pool size.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Seconds to wait for a pooled connection.
pub const DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;
