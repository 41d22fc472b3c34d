//! Structured logging schema and field name constants for carecall.
//!
//! All crates use these field names so log aggregation can query reminder
//! activity across the engine, the sweep worker and the API.
//!
//! `tracing` macros take field names as identifiers, so call sites spell
//! the names out (`info!(reminder_id = %id, ...)`). The constants here are
//! the reference list those call sites follow; the tests check that each
//! one is emitted somewhere in the scheduler or the pool.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue (lost race, failed dispatch, sweep retry) |
//! | INFO  | Lifecycle events (startup, shutdown), transitions, sweep totals |
//! | DEBUG | Decision points, config choices, empty sweeps |
//! | TRACE | Per-reminder iteration inside a sweep |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "db", "scheduler"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "engine", "sweep", "tools", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "schedule", "mark_triggered", "record_outcome", "sweep"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Reminder UUID being operated on.
pub const REMINDER_ID: &str = "reminder_id";

/// Senior the reminder belongs to.
pub const USER_ID: &str = "user_id";

/// Reminder kind tag.
pub const KIND: &str = "kind";

/// Status before a transition.
pub const FROM_STATUS: &str = "from";

/// Status after a transition.
pub const TO_STATUS: &str = "to";

/// Outcome recorded for a call.
pub const OUTCOME: &str = "outcome";

/// Tool name for tool-call bridge events.
pub const TOOL: &str = "tool";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of reminders returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Reminders triggered by a sweep.
pub const TRIGGERED: &str = "triggered";

/// Reminders skipped by a sweep (lost race or cancelled).
pub const SKIPPED: &str = "skipped";

/// Reminders that failed to trigger.
pub const FAILED: &str = "failed";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
