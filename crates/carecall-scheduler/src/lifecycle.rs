//! Reminder lifecycle engine.
//!
//! Every status change goes through [`ReminderEngine`]. Each operation checks
//! the edge against [`ReminderStatus::can_transition_to`] and then applies
//! its patch with [`ReminderStore::update_if`], so a concurrent writer that
//! moved the record first turns into `InvalidTransition` instead of a lost
//! update.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use carecall_core::{
    defaults, Clock, ConditionalUpdate, Error, NewReminder, Reminder, ReminderOutcome,
    ReminderPatch, ReminderStatus, ReminderStore, Result, ScheduleReminderRequest, Stamp,
    SystemClock,
};

/// Applies lifecycle transitions to reminders held in a [`ReminderStore`].
#[derive(Clone)]
pub struct ReminderEngine {
    store: Arc<dyn ReminderStore>,
    clock: Arc<dyn Clock>,
}

impl ReminderEngine {
    /// Engine over `store` using the wall clock.
    pub fn new(store: Arc<dyn ReminderStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Engine over `store` using the given clock.
    pub fn with_clock(store: Arc<dyn ReminderStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn ReminderStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Current time according to the engine's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Validate a loose scheduling request and create a `pending` reminder.
    ///
    /// Past times are accepted; the next sweep triggers them.
    pub async fn schedule(&self, request: ScheduleReminderRequest) -> Result<Uuid> {
        let new = request.into_new_reminder()?;
        Ok(self.create(new).await?.id)
    }

    /// Create a `pending` reminder from already-typed input.
    #[instrument(skip(self, new), fields(subsystem = "scheduler", component = "engine", op = "schedule"))]
    pub async fn create(&self, new: NewReminder) -> Result<Reminder> {
        new.validate()?;
        let reminder = self.store.create(new).await?;

        info!(
            reminder_id = %reminder.id,
            user_id = %reminder.user_id,
            kind = %reminder.kind,
            scheduled_time = %reminder.scheduled_time,
            "Reminder scheduled"
        );
        Ok(reminder)
    }

    /// Fetch a reminder, `NotFound` when absent.
    pub async fn get(&self, id: Uuid) -> Result<Reminder> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| Error::reminder_not_found(id))
    }

    /// `pending -> pinging`: a call attempt is starting.
    ///
    /// Stamps `triggered_at` and counts the attempt. Fails with
    /// `InvalidTransition` when another caller already moved the reminder.
    pub async fn mark_triggered(&self, id: Uuid) -> Result<Reminder> {
        let patch = ReminderPatch::new()
            .status(ReminderStatus::Pinging)
            .triggered_at(Stamp::Now)
            .increment_attempts();

        let reminder = self
            .apply(id, ReminderStatus::Pending, ReminderStatus::Pinging, patch)
            .await?;

        info!(
            subsystem = "scheduler",
            component = "engine",
            op = "mark_triggered",
            reminder_id = %id,
            user_id = %reminder.user_id,
            attempts = reminder.attempts,
            "Reminder triggered"
        );
        Ok(reminder)
    }

    /// Record what happened on the call. Requires `pinging`.
    ///
    /// `Delayed` needs `reschedule_time` and returns the reminder to
    /// `pending` at that time as a fresh attempt. Every other outcome is
    /// terminal and stamps `completed_at`.
    pub async fn record_outcome(
        &self,
        id: Uuid,
        outcome: ReminderOutcome,
        reschedule_time: Option<DateTime<Utc>>,
        note: Option<String>,
    ) -> Result<Reminder> {
        let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        let patch = match outcome {
            ReminderOutcome::Delayed => {
                let at = reschedule_time.ok_or_else(|| {
                    Error::InvalidInput(
                        "reschedule_time is required for a delayed outcome".to_string(),
                    )
                })?;
                ReminderPatch::new()
                    .status(ReminderStatus::Pending)
                    .scheduled_time(at)
                    .reset_attempt()
            }
            _ => ReminderPatch::new()
                .status(outcome.status())
                .completed_at(Stamp::Now),
        }
        .last_outcome(outcome)
        .outcome_note(note);

        ReminderStatus::Pinging.ensure_transition(id, outcome.resulting_status())?;

        let reminder = match self
            .store
            .update_if(id, ReminderStatus::Pinging, patch)
            .await?
        {
            ConditionalUpdate::Applied(reminder) => reminder,
            ConditionalUpdate::StatusMismatch { actual } => {
                debug!(reminder_id = %id, from = %actual, outcome = %outcome, "Outcome rejected");
                return Err(Error::InvalidTransition {
                    id,
                    from: actual,
                    to: outcome.status(),
                });
            }
        };

        info!(
            subsystem = "scheduler",
            component = "engine",
            op = "record_outcome",
            reminder_id = %id,
            user_id = %reminder.user_id,
            outcome = %outcome,
            to = %reminder.status,
            "Reminder outcome recorded"
        );
        Ok(reminder)
    }

    /// Move a non-terminal reminder to `error`, storing `message`.
    ///
    /// Retries the conditional update if the status changes underneath, so a
    /// dispatch failure racing with another writer is not dropped.
    pub async fn mark_error(&self, id: Uuid, message: impl Into<String>) -> Result<Reminder> {
        let message = message.into();

        let reminder = self
            .retry_from_current(id, ReminderStatus::Error, |current| {
                if current.is_terminal() {
                    return None;
                }
                Some(
                    ReminderPatch::new()
                        .status(ReminderStatus::Error)
                        .error_message(Some(message.clone())),
                )
            })
            .await?;

        warn!(
            subsystem = "scheduler",
            component = "engine",
            op = "mark_error",
            reminder_id = %id,
            user_id = %reminder.user_id,
            error = %message,
            "Reminder marked as error"
        );
        Ok(reminder)
    }

    /// Explicitly move a reminder to `new_time` as a fresh `pending` attempt.
    ///
    /// Allowed from every status except `pinging`: an in-flight call must
    /// record its outcome instead.
    pub async fn reschedule(&self, id: Uuid, new_time: DateTime<Utc>) -> Result<Reminder> {
        let reminder = self
            .retry_from_current(id, ReminderStatus::Pending, |current| {
                if current == ReminderStatus::Pinging {
                    return None;
                }
                Some(
                    ReminderPatch::new()
                        .status(ReminderStatus::Pending)
                        .scheduled_time(new_time)
                        .reset_attempt(),
                )
            })
            .await?;

        info!(
            subsystem = "scheduler",
            component = "engine",
            op = "reschedule",
            reminder_id = %id,
            user_id = %reminder.user_id,
            scheduled_time = %new_time,
            "Reminder rescheduled"
        );
        Ok(reminder)
    }

    /// Hard-delete a reminder from any status.
    pub async fn cancel(&self, id: Uuid) -> Result<()> {
        self.store.delete(id).await?;
        info!(
            subsystem = "scheduler",
            component = "engine",
            op = "cancel",
            reminder_id = %id,
            "Reminder cancelled"
        );
        Ok(())
    }

    /// Check the edge, then apply `patch` only if the status is still `from`.
    async fn apply(
        &self,
        id: Uuid,
        from: ReminderStatus,
        to: ReminderStatus,
        patch: ReminderPatch,
    ) -> Result<Reminder> {
        from.ensure_transition(id, to)?;

        match self.store.update_if(id, from, patch).await? {
            ConditionalUpdate::Applied(reminder) => Ok(reminder),
            ConditionalUpdate::StatusMismatch { actual } => {
                debug!(reminder_id = %id, expected = %from, actual = %actual, "Lost transition race");
                Err(Error::InvalidTransition {
                    id,
                    from: actual,
                    to,
                })
            }
        }
    }

    /// Read the current status, build a patch for it, and apply it with a
    /// conditional update. Re-reads and retries when the status moved in
    /// between, up to [`defaults::CAS_MAX_RETRIES`] times.
    ///
    /// `build` returns `None` to refuse the transition from that status.
    async fn retry_from_current<F>(&self, id: Uuid, to: ReminderStatus, build: F) -> Result<Reminder>
    where
        F: Fn(ReminderStatus) -> Option<ReminderPatch>,
    {
        let mut current = self.get(id).await?.status;

        for _ in 0..=defaults::CAS_MAX_RETRIES {
            let invalid = Error::InvalidTransition {
                id,
                from: current,
                to,
            };
            let patch = build(current).ok_or(invalid)?;
            // Same-status updates (pending -> pending on reschedule) are not
            // edges of the state machine.
            if current != to {
                current.ensure_transition(id, to)?;
            }

            match self.store.update_if(id, current, patch).await? {
                ConditionalUpdate::Applied(reminder) => return Ok(reminder),
                ConditionalUpdate::StatusMismatch { actual } => {
                    debug!(reminder_id = %id, expected = %current, actual = %actual, "Status moved, retrying");
                    current = actual;
                }
            }
        }

        Err(Error::Internal(format!(
            "Reminder {} kept changing status, gave up after {} attempts",
            id,
            defaults::CAS_MAX_RETRIES + 1
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carecall_core::{ManualClock, ReminderKind};
    use carecall_db::MemoryReminderStore;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    fn engine() -> ReminderEngine {
        let clock = Arc::new(ManualClock::new(t0()));
        ReminderEngine::with_clock(
            Arc::new(MemoryReminderStore::with_clock(clock.clone())),
            clock,
        )
    }

    async fn pending(engine: &ReminderEngine) -> Reminder {
        engine
            .create(NewReminder::new("u1", ReminderKind::Medication, t0()))
            .await
            .unwrap()
    }

    async fn pinging(engine: &ReminderEngine) -> Reminder {
        let r = pending(engine).await;
        engine.mark_triggered(r.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_schedule_rejects_naive_timestamp() {
        let err = engine()
            .schedule(ScheduleReminderRequest {
                user_id: "u1".into(),
                kind: "medication".into(),
                scheduled_time: "2025-01-01T09:00:00".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_schedule_accepts_past_time() {
        let engine = engine();
        let id = engine
            .schedule(ScheduleReminderRequest {
                user_id: "u1".into(),
                kind: "check_in".into(),
                scheduled_time: "2000-01-01T00:00:00Z".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(engine.get(id).await.unwrap().status, ReminderStatus::Pending);
    }

    #[tokio::test]
    async fn test_mark_triggered_twice_is_invalid_transition() {
        let engine = engine();
        let r = pinging(&engine).await;
        assert_eq!(r.attempts, 1);
        assert!(r.triggered_at.is_some());

        let err = engine.mark_triggered(r.id).await.unwrap_err();
        assert!(err.is_invalid_transition());
    }

    #[tokio::test]
    async fn test_record_outcome_requires_pinging() {
        let engine = engine();
        let r = pending(&engine).await;
        let err = engine
            .record_outcome(r.id, ReminderOutcome::Completed, None, None)
            .await
            .unwrap_err();
        assert!(err.is_invalid_transition());
    }

    #[tokio::test]
    async fn test_record_completed_stamps_completed_at() {
        let engine = engine();
        let r = pinging(&engine).await;
        let done = engine
            .record_outcome(r.id, ReminderOutcome::Completed, None, Some("  ".into()))
            .await
            .unwrap();
        assert_eq!(done.status, ReminderStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.last_outcome, Some(ReminderOutcome::Completed));
        assert!(done.outcome_note.is_none());
    }

    #[tokio::test]
    async fn test_delayed_without_time_is_rejected_before_mutation() {
        let engine = engine();
        let r = pinging(&engine).await;
        let err = engine
            .record_outcome(r.id, ReminderOutcome::Delayed, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(engine.get(r.id).await.unwrap().status, ReminderStatus::Pinging);
    }

    #[tokio::test]
    async fn test_delayed_returns_to_pending_with_new_time() {
        let engine = engine();
        let r = pinging(&engine).await;
        let later = t0() + Duration::minutes(10);

        let delayed = engine
            .record_outcome(r.id, ReminderOutcome::Delayed, Some(later), Some("not hungry".into()))
            .await
            .unwrap();

        assert_eq!(delayed.status, ReminderStatus::Pending);
        assert_eq!(delayed.scheduled_time, later);
        assert!(delayed.triggered_at.is_none());
        assert_eq!(delayed.attempts, 1);
        assert_eq!(delayed.last_outcome, Some(ReminderOutcome::Delayed));
        assert_eq!(delayed.outcome_note.as_deref(), Some("not hungry"));
    }

    #[tokio::test]
    async fn test_mark_error_from_pending_and_pinging() {
        let engine = engine();
        let a = pending(&engine).await;
        let b = pinging(&engine).await;

        let a = engine.mark_error(a.id, "no phone number").await.unwrap();
        let b = engine.mark_error(b.id, "dial failed").await.unwrap();
        assert_eq!(a.status, ReminderStatus::Error);
        assert_eq!(b.error_message.as_deref(), Some("dial failed"));
    }

    #[tokio::test]
    async fn test_mark_error_from_terminal_is_invalid() {
        let engine = engine();
        let r = pinging(&engine).await;
        engine
            .record_outcome(r.id, ReminderOutcome::Refused, None, None)
            .await
            .unwrap();
        let err = engine.mark_error(r.id, "late failure").await.unwrap_err();
        assert!(err.is_invalid_transition());
    }

    #[tokio::test]
    async fn test_reschedule_rejected_while_pinging() {
        let engine = engine();
        let r = pinging(&engine).await;
        let err = engine
            .reschedule(r.id, t0() + Duration::hours(1))
            .await
            .unwrap_err();
        assert!(err.is_invalid_transition());
    }

    #[tokio::test]
    async fn test_reschedule_from_terminal_and_pending() {
        let engine = engine();
        let r = pinging(&engine).await;
        engine
            .record_outcome(r.id, ReminderOutcome::Ignored, None, None)
            .await
            .unwrap();

        let later = t0() + Duration::hours(2);
        let again = engine.reschedule(r.id, later).await.unwrap();
        assert_eq!(again.status, ReminderStatus::Pending);
        assert!(again.completed_at.is_none());
        assert_eq!(again.last_outcome, Some(ReminderOutcome::Ignored));

        let even_later = later + Duration::hours(1);
        let moved = engine.reschedule(r.id, even_later).await.unwrap();
        assert_eq!(moved.scheduled_time, even_later);
    }

    #[tokio::test]
    async fn test_cancel_then_get_is_not_found() {
        let engine = engine();
        let r = pending(&engine).await;
        engine.cancel(r.id).await.unwrap();
        assert!(matches!(engine.get(r.id).await, Err(Error::NotFound(_))));
        assert!(matches!(engine.cancel(r.id).await, Err(Error::NotFound(_))));
    }
}
