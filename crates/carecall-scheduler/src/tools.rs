//! Tool calls made by the voice session while a reminder call is live.
//!
//! Every handler returns a [`ToolResult`] and never an error: the voice
//! model reads `success` and `message`/`error` to decide what to say next.

use std::sync::Arc;

use chrono::Duration;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};
use uuid::Uuid;

use carecall_core::temporal::{format_delay, parse_delay, positive_minutes};
use carecall_core::{
    defaults, Error, FamilyNotification, FamilyNotifier, NoOpFamilyNotifier, NoOpVitalsRecorder,
    Reminder, ReminderOutcome, ToolResult, VitalsReading, VitalsRecorder,
};

use crate::lifecycle::ReminderEngine;

/// Tool names understood by [`ToolBridge::dispatch`].
pub const TOOL_NAMES: [&str; 5] = [
    "log_success",
    "reschedule",
    "log_outcome",
    "notify_family",
    "log_vitals",
];

#[derive(Debug, Deserialize)]
struct ReminderArgs {
    reminder_id: Uuid,
    #[serde(default, alias = "reason")]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RescheduleArgs {
    reminder_id: Uuid,
    #[serde(default)]
    delay_minutes: Option<i64>,
    #[serde(default)]
    delay: Option<String>,
    #[serde(default, alias = "reason")]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutcomeArgs {
    reminder_id: Uuid,
    outcome: String,
    #[serde(default, alias = "reason")]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotifyArgs {
    message: String,
    #[serde(default)]
    urgent: bool,
    #[serde(default)]
    reminder_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct VitalsArgs {
    metric: String,
    value: f64,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    note: Option<String>,
}

/// Maps tool calls onto the lifecycle engine and side-effect collaborators.
#[derive(Clone)]
pub struct ToolBridge {
    engine: ReminderEngine,
    notifier: Arc<dyn FamilyNotifier>,
    vitals: Arc<dyn VitalsRecorder>,
}

impl ToolBridge {
    /// Bridge with no family notifier or vitals recorder wired up.
    pub fn new(engine: ReminderEngine) -> Self {
        Self {
            engine,
            notifier: Arc::new(NoOpFamilyNotifier),
            vitals: Arc::new(NoOpVitalsRecorder),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn FamilyNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_vitals(mut self, vitals: Arc<dyn VitalsRecorder>) -> Self {
        self.vitals = vitals;
        self
    }

    /// Run `tool_name` with JSON `args` on behalf of `user_id`.
    pub async fn dispatch(&self, tool_name: &str, args: &JsonValue, user_id: &str) -> ToolResult {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return ToolResult::err("user_id is required");
        }

        let result = match tool_name {
            "log_success" => match parse_args::<ReminderArgs>(args) {
                Ok(a) => self.log_success(user_id, a.reminder_id, a.note).await,
                Err(e) => e,
            },
            "reschedule" => match parse_args::<RescheduleArgs>(args) {
                Ok(a) => match resolve_delay(a.delay_minutes, a.delay.as_deref()) {
                    Ok(delay) => self.reschedule(user_id, a.reminder_id, delay, a.note).await,
                    Err(e) => ToolResult::err(e),
                },
                Err(e) => e,
            },
            "log_outcome" => match parse_args::<OutcomeArgs>(args) {
                Ok(a) => match a.outcome.parse::<ReminderOutcome>() {
                    Ok(outcome) => {
                        self.log_outcome(user_id, a.reminder_id, outcome, a.note)
                            .await
                    }
                    Err(e) => ToolResult::err(e.to_string()),
                },
                Err(e) => e,
            },
            "notify_family" => match parse_args::<NotifyArgs>(args) {
                Ok(a) => {
                    self.notify_family(user_id, &a.message, a.urgent, a.reminder_id)
                        .await
                }
                Err(e) => e,
            },
            "log_vitals" => match parse_args::<VitalsArgs>(args) {
                Ok(a) => {
                    self.log_vitals(VitalsReading {
                        user_id: user_id.to_string(),
                        metric: a.metric,
                        value: a.value,
                        unit: a.unit,
                        note: a.note,
                    })
                    .await
                }
                Err(e) => e,
            },
            other => ToolResult::err(format!("Unknown tool: {}", other)),
        };

        info!(
            subsystem = "scheduler",
            component = "tools",
            tool = tool_name,
            user_id,
            success = result.success,
            "Tool call handled"
        );
        result
    }

    /// The user took their medication or finished the task.
    pub async fn log_success(
        &self,
        user_id: &str,
        reminder_id: Uuid,
        note: Option<String>,
    ) -> ToolResult {
        self.outcome(user_id, reminder_id, ReminderOutcome::Completed, None, note)
            .await
            .map(|_| ToolResult::ok("Logged as completed"))
            .unwrap_or_else(|e| e)
    }

    /// The user asked to be called back after `delay`.
    pub async fn reschedule(
        &self,
        user_id: &str,
        reminder_id: Uuid,
        delay: Duration,
        note: Option<String>,
    ) -> ToolResult {
        if delay <= Duration::zero() {
            return ToolResult::err("delay must be positive");
        }
        if delay > Duration::minutes(defaults::RESCHEDULE_MAX_DELAY_MINUTES) {
            return ToolResult::err("delay must be at most one week");
        }

        let at = self.engine.now() + delay;
        self.outcome(user_id, reminder_id, ReminderOutcome::Delayed, Some(at), note)
            .await
            .map(|r| {
                ToolResult::ok(format!("Rescheduled in {}", format_delay(delay))).with_data(
                    json!({ "reminder_id": r.id, "scheduled_time": r.scheduled_time }),
                )
            })
            .unwrap_or_else(|e| e)
    }

    /// Record refused, partially done, ignored or completed.
    ///
    /// Delays go through [`ToolBridge::reschedule`] since they need a time.
    pub async fn log_outcome(
        &self,
        user_id: &str,
        reminder_id: Uuid,
        outcome: ReminderOutcome,
        note: Option<String>,
    ) -> ToolResult {
        if outcome == ReminderOutcome::Delayed {
            return ToolResult::err("Use the reschedule tool for delayed outcomes");
        }

        self.outcome(user_id, reminder_id, outcome, None, note)
            .await
            .map(|_| ToolResult::ok(format!("Logged as {}", outcome)))
            .unwrap_or_else(|e| e)
    }

    /// Alert the user's family.
    pub async fn notify_family(
        &self,
        user_id: &str,
        message: &str,
        urgent: bool,
        reminder_id: Option<Uuid>,
    ) -> ToolResult {
        let message = message.trim();
        if message.is_empty() {
            return ToolResult::err("message is required");
        }

        let notification = FamilyNotification {
            user_id: user_id.to_string(),
            message: message.to_string(),
            urgent,
            reminder_id,
        };

        match self.notifier.notify(&notification).await {
            Ok(()) => {
                info!(
                    subsystem = "scheduler",
                    component = "tools",
                    user_id,
                    urgent,
                    "Family notified"
                );
                ToolResult::ok("Family notified")
            }
            Err(e) => {
                warn!(user_id, error = %e, "Family notification failed");
                ToolResult::err(format!("Could not notify family: {}", e))
            }
        }
    }

    /// Store a vital sign reported on the call.
    pub async fn log_vitals(&self, reading: VitalsReading) -> ToolResult {
        if reading.metric.trim().is_empty() {
            return ToolResult::err("metric is required");
        }
        if !reading.value.is_finite() {
            return ToolResult::err("value must be a finite number");
        }

        match self.vitals.record(&reading).await {
            Ok(()) => ToolResult::ok(format!("Recorded {}", reading.metric)),
            Err(e) => {
                warn!(user_id = %reading.user_id, error = %e, "Vitals recording failed");
                ToolResult::err(format!("Could not record vitals: {}", e))
            }
        }
    }

    /// Check ownership, then record the outcome through the engine.
    async fn outcome(
        &self,
        user_id: &str,
        reminder_id: Uuid,
        outcome: ReminderOutcome,
        reschedule_time: Option<chrono::DateTime<chrono::Utc>>,
        note: Option<String>,
    ) -> std::result::Result<Reminder, ToolResult> {
        let reminder = self.engine.get(reminder_id).await.map_err(engine_error)?;
        if reminder.user_id != user_id {
            return Err(ToolResult::err("Reminder does not belong to this user"));
        }

        self.engine
            .record_outcome(reminder_id, outcome, reschedule_time, note)
            .await
            .map_err(engine_error)
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(args: &JsonValue) -> std::result::Result<T, ToolResult> {
    serde_json::from_value(args.clone())
        .map_err(|e| ToolResult::err(format!("Invalid arguments: {}", e)))
}

/// `delay_minutes` wins over `delay`; with neither, the default callback delay.
fn resolve_delay(minutes: Option<i64>, text: Option<&str>) -> std::result::Result<Duration, String> {
    match (minutes, text) {
        (Some(m), _) => positive_minutes(m).ok_or_else(|| {
            format!(
                "delay_minutes must be between 1 and {}",
                defaults::RESCHEDULE_MAX_DELAY_MINUTES
            )
        }),
        (None, Some(t)) => parse_delay(t).map_err(|e| e.to_string()),
        (None, None) => Ok(Duration::minutes(defaults::RESCHEDULE_DELAY_MINUTES)),
    }
}

fn engine_error(e: Error) -> ToolResult {
    match e {
        Error::NotFound(_) => ToolResult::err("Reminder not found"),
        Error::InvalidTransition { from, .. } => {
            ToolResult::err(format!("Reminder is {} and cannot take this outcome", from))
        }
        other => {
            warn!(subsystem = "scheduler", component = "tools", error = %other, "Tool call failed");
            ToolResult::err(other.to_string())
        }
    }
}
