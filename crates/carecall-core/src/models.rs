//! Data models for carecall reminders.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::temporal::parse_timestamp;

// =============================================================================
// STATUS STATE MACHINE
// =============================================================================

/// Lifecycle status of a reminder.
///
/// `pending` is the initial state. A sweep moves a due reminder to `pinging`
/// once a call attempt is dispatched; the call then records one of the
/// outcome statuses. Only an explicit reschedule leads back to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    /// Waiting for its scheduled time.
    Pending,
    /// A call attempt has been dispatched.
    Pinging,
    /// The task was done.
    Completed,
    /// The user asked to be called back later.
    Delayed,
    /// The user explicitly declined.
    Refused,
    /// The task was only partly done (one pill out of two).
    PartiallyDone,
    /// Call answered but the user hung up or stayed silent.
    Ignored,
    /// Dispatch or processing failed.
    Error,
}

impl ReminderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [ReminderStatus; 8] = [
        ReminderStatus::Pending,
        ReminderStatus::Pinging,
        ReminderStatus::Completed,
        ReminderStatus::Delayed,
        ReminderStatus::Refused,
        ReminderStatus::PartiallyDone,
        ReminderStatus::Ignored,
        ReminderStatus::Error,
    ];

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Pending => "pending",
            ReminderStatus::Pinging => "pinging",
            ReminderStatus::Completed => "completed",
            ReminderStatus::Delayed => "delayed",
            ReminderStatus::Refused => "refused",
            ReminderStatus::PartiallyDone => "partially_done",
            ReminderStatus::Ignored => "ignored",
            ReminderStatus::Error => "error",
        }
    }

    /// Terminal statuses only leave via an explicit reschedule.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReminderStatus::Completed
                | ReminderStatus::Refused
                | ReminderStatus::PartiallyDone
                | ReminderStatus::Ignored
                | ReminderStatus::Error
        )
    }

    /// The single authority on which status edges are legal.
    pub fn can_transition_to(&self, next: ReminderStatus) -> bool {
        use ReminderStatus::*;

        match (self, next) {
            (Pending, Pinging) | (Pending, Error) => true,
            (Pinging, Completed)
            | (Pinging, Delayed)
            | (Pinging, Refused)
            | (Pinging, PartiallyDone)
            | (Pinging, Ignored)
            | (Pinging, Error)
            | (Pinging, Pending) => true,
            (Delayed, Pending) | (Delayed, Error) => true,
            (from, Pending) if from.is_terminal() => true,
            _ => false,
        }
    }

    /// Return `Ok(())` when `self -> next` is legal, else `InvalidTransition`.
    pub fn ensure_transition(&self, id: Uuid, next: ReminderStatus) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                id,
                from: *self,
                to: next,
            })
        }
    }
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReminderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ReminderStatus::Pending),
            "pinging" | "triggered" => Ok(ReminderStatus::Pinging),
            "completed" => Ok(ReminderStatus::Completed),
            "delayed" | "rescheduled" => Ok(ReminderStatus::Delayed),
            "refused" => Ok(ReminderStatus::Refused),
            "partially_done" => Ok(ReminderStatus::PartiallyDone),
            "ignored" => Ok(ReminderStatus::Ignored),
            "error" => Ok(ReminderStatus::Error),
            other => Err(Error::InvalidInput(format!(
                "Unknown reminder status: {}",
                other
            ))),
        }
    }
}

/// Outcome recorded for a dispatched reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderOutcome {
    Completed,
    Delayed,
    Refused,
    PartiallyDone,
    Ignored,
}

impl ReminderOutcome {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        self.status().as_str()
    }

    /// Status the reminder lands in right after the outcome is recorded.
    ///
    /// `Delayed` is recorded as a reschedule, so the record lands back in
    /// `Pending` with the new due time.
    pub fn resulting_status(&self) -> ReminderStatus {
        match self {
            ReminderOutcome::Delayed => ReminderStatus::Pending,
            other => other.status(),
        }
    }

    /// Status named by this outcome.
    pub fn status(&self) -> ReminderStatus {
        match self {
            ReminderOutcome::Completed => ReminderStatus::Completed,
            ReminderOutcome::Delayed => ReminderStatus::Delayed,
            ReminderOutcome::Refused => ReminderStatus::Refused,
            ReminderOutcome::PartiallyDone => ReminderStatus::PartiallyDone,
            ReminderOutcome::Ignored => ReminderStatus::Ignored,
        }
    }
}

impl fmt::Display for ReminderOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReminderOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" | "done" => Ok(ReminderOutcome::Completed),
            "delayed" | "rescheduled" => Ok(ReminderOutcome::Delayed),
            "refused" => Ok(ReminderOutcome::Refused),
            "partially_done" => Ok(ReminderOutcome::PartiallyDone),
            "ignored" => Ok(ReminderOutcome::Ignored),
            other => Err(Error::InvalidInput(format!(
                "Unknown reminder outcome: {}",
                other
            ))),
        }
    }
}

// =============================================================================
// REMINDER KIND
// =============================================================================

/// What a reminder is about. Open tag: unknown kinds are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ReminderKind {
    Medication,
    CheckIn,
    Companion,
    Appointment,
    EmergencyFollowUp,
    Other(String),
}

impl ReminderKind {
    /// Parse a kind tag. Separators `-` and spaces normalise to `_`.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw
            .trim()
            .to_ascii_lowercase()
            .replace(['-', ' '], "_");

        if normalized.is_empty() {
            return Err(Error::InvalidInput("kind is required".to_string()));
        }

        Ok(match normalized.as_str() {
            "medication" => ReminderKind::Medication,
            "check_in" | "checkin" => ReminderKind::CheckIn,
            "companion" | "casual" => ReminderKind::Companion,
            "appointment" => ReminderKind::Appointment,
            "emergency_follow_up" | "emergency_followup" => ReminderKind::EmergencyFollowUp,
            _ => ReminderKind::Other(normalized),
        })
    }

    /// Storage representation.
    pub fn as_str(&self) -> &str {
        match self {
            ReminderKind::Medication => "medication",
            ReminderKind::CheckIn => "check_in",
            ReminderKind::Companion => "companion",
            ReminderKind::Appointment => "appointment",
            ReminderKind::EmergencyFollowUp => "emergency_follow_up",
            ReminderKind::Other(tag) => tag,
        }
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ReminderKind> for String {
    fn from(kind: ReminderKind) -> Self {
        kind.as_str().to_string()
    }
}

impl TryFrom<String> for ReminderKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        ReminderKind::parse(&value)
    }
}

// =============================================================================
// REMINDER RECORD
// =============================================================================

/// A persisted reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub user_id: String,
    pub kind: ReminderKind,
    pub medication_name: Option<String>,
    pub about: Option<String>,
    /// Extra upstream fields (dosage, title...). Always a JSON object.
    pub metadata: Option<JsonValue>,
    pub scheduled_time: DateTime<Utc>,
    pub status: ReminderStatus,
    pub is_recurring: bool,
    /// Number of times this reminder has been triggered.
    pub attempts: i32,
    /// Most recent outcome, kept across reschedules.
    pub last_outcome: Option<ReminderOutcome>,
    pub outcome_note: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub triggered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Reminder {
    /// Pending and scheduled at or before `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ReminderStatus::Pending && self.scheduled_time <= now
    }
}

/// Validated input for creating a reminder. Stores assign everything else.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReminder {
    pub user_id: String,
    pub kind: ReminderKind,
    pub medication_name: Option<String>,
    pub about: Option<String>,
    pub metadata: Option<JsonValue>,
    pub scheduled_time: DateTime<Utc>,
    pub is_recurring: bool,
}

impl NewReminder {
    /// Minimal reminder with no descriptive payload.
    pub fn new(
        user_id: impl Into<String>,
        kind: ReminderKind,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            medication_name: None,
            about: None,
            metadata: None,
            scheduled_time,
            is_recurring: false,
        }
    }

    pub fn with_medication(mut self, name: impl Into<String>) -> Self {
        self.medication_name = Some(name.into());
        self
    }

    pub fn with_about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn recurring(mut self, is_recurring: bool) -> Self {
        self.is_recurring = is_recurring;
        self
    }

    /// Check required fields. Called by the engine before any store write.
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::InvalidInput("user_id is required".to_string()));
        }
        if let ReminderKind::Other(tag) = &self.kind {
            if tag.trim().is_empty() {
                return Err(Error::InvalidInput("kind is required".to_string()));
            }
        }
        if let Some(metadata) = &self.metadata {
            if !metadata.is_object() {
                return Err(Error::InvalidInput(
                    "metadata must be a JSON object".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Loose scheduling request as received from the API or an upstream
/// extraction step.
///
/// Unknown fields are collected into `extra` and folded into `metadata`
/// by [`ScheduleReminderRequest::into_new_reminder`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleReminderRequest {
    #[serde(default)]
    pub user_id: String,
    /// Accepts the legacy `type` field name.
    #[serde(default, alias = "type")]
    pub kind: String,
    /// RFC 3339 timestamp with an explicit offset.
    #[serde(default)]
    pub scheduled_time: String,
    #[serde(default)]
    pub medication_name: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl ScheduleReminderRequest {
    /// Validate and convert into a [`NewReminder`].
    pub fn into_new_reminder(self) -> Result<NewReminder> {
        let user_id = self.user_id.trim().to_string();
        if user_id.is_empty() {
            return Err(Error::InvalidInput("user_id is required".to_string()));
        }

        let kind = ReminderKind::parse(&self.kind)?;

        if self.scheduled_time.trim().is_empty() {
            return Err(Error::InvalidInput(
                "scheduled_time is required".to_string(),
            ));
        }
        let scheduled_time = parse_timestamp(&self.scheduled_time)?;

        let mut metadata = match self.metadata {
            None | Some(JsonValue::Null) => Map::new(),
            Some(JsonValue::Object(map)) => map,
            Some(_) => {
                return Err(Error::InvalidInput(
                    "metadata must be a JSON object".to_string(),
                ))
            }
        };
        // Explicit metadata keys win over loose top-level extras.
        for (key, value) in self.extra {
            metadata.entry(key).or_insert(value);
        }

        let new = NewReminder {
            user_id,
            kind,
            medication_name: non_empty(self.medication_name),
            about: non_empty(self.about),
            metadata: if metadata.is_empty() {
                None
            } else {
                Some(JsonValue::Object(metadata))
            },
            scheduled_time,
            is_recurring: self.is_recurring,
        };
        new.validate()?;
        Ok(new)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// PATCHES AND CONDITIONAL UPDATES
// =============================================================================

/// A store-assigned timestamp change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    /// Set to the store's current time.
    Now,
    /// Reset to null.
    Clear,
}

/// Partial update of a reminder. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReminderPatch {
    pub status: Option<ReminderStatus>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub triggered_at: Option<Stamp>,
    pub completed_at: Option<Stamp>,
    pub increment_attempts: bool,
    pub last_outcome: Option<ReminderOutcome>,
    pub outcome_note: Option<Option<String>>,
    pub error_message: Option<Option<String>>,
}

impl ReminderPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: ReminderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn scheduled_time(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_time = Some(at);
        self
    }

    pub fn triggered_at(mut self, stamp: Stamp) -> Self {
        self.triggered_at = Some(stamp);
        self
    }

    pub fn completed_at(mut self, stamp: Stamp) -> Self {
        self.completed_at = Some(stamp);
        self
    }

    pub fn increment_attempts(mut self) -> Self {
        self.increment_attempts = true;
        self
    }

    pub fn last_outcome(mut self, outcome: ReminderOutcome) -> Self {
        self.last_outcome = Some(outcome);
        self
    }

    pub fn outcome_note(mut self, note: Option<String>) -> Self {
        self.outcome_note = Some(note);
        self
    }

    pub fn error_message(mut self, message: Option<String>) -> Self {
        self.error_message = Some(message);
        self
    }

    /// Clear the per-attempt fields so the reminder starts a fresh attempt.
    pub fn reset_attempt(self) -> Self {
        self.triggered_at(Stamp::Clear)
            .completed_at(Stamp::Clear)
            .error_message(None)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to an in-memory record, using `now` for [`Stamp::Now`].
    pub fn apply_to(&self, reminder: &mut Reminder, now: DateTime<Utc>) {
        let resolve = |stamp: Stamp| match stamp {
            Stamp::Now => Some(now),
            Stamp::Clear => None,
        };

        if let Some(status) = self.status {
            reminder.status = status;
        }
        if let Some(at) = self.scheduled_time {
            reminder.scheduled_time = at;
        }
        if let Some(stamp) = self.triggered_at {
            reminder.triggered_at = resolve(stamp);
        }
        if let Some(stamp) = self.completed_at {
            reminder.completed_at = resolve(stamp);
        }
        if self.increment_attempts {
            reminder.attempts += 1;
        }
        if let Some(outcome) = self.last_outcome {
            reminder.last_outcome = Some(outcome);
        }
        if let Some(note) = &self.outcome_note {
            reminder.outcome_note = note.clone();
        }
        if let Some(message) = &self.error_message {
            reminder.error_message = message.clone();
        }
        reminder.updated_at = now;
    }
}

/// Result of a compare-and-swap on a reminder's status.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionalUpdate {
    /// The expected status matched and the patch was written.
    Applied(Reminder),
    /// The record exists but its status differed; nothing was written.
    StatusMismatch { actual: ReminderStatus },
}

// =============================================================================
// QUERIES
// =============================================================================

/// Result ordering for reminder queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReminderOrder {
    /// Soonest first.
    #[default]
    ScheduledAsc,
    /// Latest first.
    ScheduledDesc,
    /// Most recently created first.
    CreatedDesc,
}

/// Conjunctive filter over indexed reminder fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReminderQuery {
    pub user_id: Option<String>,
    pub status: Option<ReminderStatus>,
    /// `scheduled_time <= due_at_or_before`
    pub due_at_or_before: Option<DateTime<Utc>>,
    pub order: ReminderOrder,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ReminderQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending reminders due at `now`, soonest first.
    pub fn due(now: DateTime<Utc>) -> Self {
        Self::new()
            .with_status(ReminderStatus::Pending)
            .due_at_or_before(now)
    }

    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: ReminderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn due_at_or_before(mut self, at: DateTime<Utc>) -> Self {
        self.due_at_or_before = Some(at);
        self
    }

    pub fn ordered(mut self, order: ReminderOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Whether a record satisfies every filter.
    pub fn matches(&self, reminder: &Reminder) -> bool {
        if let Some(user_id) = &self.user_id {
            if &reminder.user_id != user_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if reminder.status != status {
                return false;
            }
        }
        if let Some(at) = self.due_at_or_before {
            if reminder.scheduled_time > at {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// SWEEP AND TOOL-CALL RESULTS
// =============================================================================

/// Summary of one due-scan sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Evaluation time used for "due".
    pub swept_at: DateTime<Utc>,
    /// Reminders this sweep moved to `pinging`.
    pub triggered: usize,
    /// Race losers and reminders cancelled mid-sweep.
    pub skipped: usize,
    /// Reminders whose trigger failed for another reason.
    pub failed: usize,
    pub triggered_ids: Vec<Uuid>,
}

impl SweepReport {
    pub fn empty(swept_at: DateTime<Utc>) -> Self {
        Self {
            swept_at,
            triggered: 0,
            skipped: 0,
            failed: 0,
            triggered_ids: Vec::new(),
        }
    }
}

/// Structured result returned to the voice session for every tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

impl ToolResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            data: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            data: None,
        }
    }

    pub fn with_data(mut self, data: JsonValue) -> Self {
        self.data = Some(data);
        self
    }
}

/// Message for the senior's family, raised from a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyNotification {
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub reminder_id: Option<Uuid>,
}

/// A vital sign reported during a call (blood pressure, glucose...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsReading {
    pub user_id: String,
    pub metric: String,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}
