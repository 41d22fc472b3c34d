//! Tool calls from the voice session.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use tokio::sync::Mutex;

use carecall_core::{
    Clock, Error, FamilyNotification, FamilyNotifier, ManualClock, NewReminder, Reminder, ReminderKind,
    ReminderOutcome, ReminderStatus, Result, VitalsReading, VitalsRecorder,
};
use carecall_db::MemoryReminderStore;
use carecall_scheduler::tools::TOOL_NAMES;
use carecall_scheduler::{ReminderEngine, ToolBridge};

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<FamilyNotification>>,
}

#[async_trait]
impl FamilyNotifier for RecordingNotifier {
    async fn notify(&self, notification: &FamilyNotification) -> Result<()> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

struct FailingVitals;

#[async_trait]
impl VitalsRecorder for FailingVitals {
    async fn record(&self, _reading: &VitalsReading) -> Result<()> {
        Err(Error::StoreUnavailable("vitals service down".into()))
    }
}

struct Setup {
    clock: ManualClock,
    engine: ReminderEngine,
    bridge: ToolBridge,
    notifier: Arc<RecordingNotifier>,
}

fn setup() -> Setup {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap());
    let engine = ReminderEngine::with_clock(
        Arc::new(MemoryReminderStore::with_clock(Arc::new(clock.clone()))),
        Arc::new(clock.clone()),
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let bridge = ToolBridge::new(engine.clone()).with_notifier(notifier.clone());
    Setup {
        clock,
        engine,
        bridge,
        notifier,
    }
}

/// A reminder for `user` already in a live call.
async fn live_call(s: &Setup, user: &str) -> Reminder {
    let r = s
        .engine
        .create(
            NewReminder::new(user, ReminderKind::Medication, s.engine.now())
                .with_medication("Metformin"),
        )
        .await
        .unwrap();
    s.engine.mark_triggered(r.id).await.unwrap()
}

#[tokio::test]
async fn log_success_completes_the_reminder() {
    let s = setup();
    let r = live_call(&s, "u1").await;

    let result = s
        .bridge
        .dispatch("log_success", &json!({ "reminder_id": r.id }), "u1")
        .await;

    assert!(result.success, "{:?}", result);
    let done = s.engine.get(r.id).await.unwrap();
    assert_eq!(done.status, ReminderStatus::Completed);
    assert_eq!(done.last_outcome, Some(ReminderOutcome::Completed));
}

#[tokio::test]
async fn reschedule_with_delay_minutes() {
    let s = setup();
    let r = live_call(&s, "u1").await;

    let result = s
        .bridge
        .dispatch(
            "reschedule",
            &json!({ "reminder_id": r.id, "delay_minutes": 10, "reason": "eating lunch" }),
            "u1",
        )
        .await;

    assert!(result.success, "{:?}", result);
    assert_eq!(result.message.as_deref(), Some("Rescheduled in 10 minutes"));
    let moved = s.engine.get(r.id).await.unwrap();
    assert_eq!(moved.status, ReminderStatus::Pending);
    assert_eq!(moved.scheduled_time, s.clock.now() + Duration::minutes(10));
    assert_eq!(moved.outcome_note.as_deref(), Some("eating lunch"));
}

#[tokio::test]
async fn reschedule_with_delay_string() {
    let s = setup();
    let r = live_call(&s, "u1").await;

    let result = s
        .bridge
        .dispatch("reschedule", &json!({ "reminder_id": r.id, "delay": "1h30m" }), "u1")
        .await;

    assert!(result.success, "{:?}", result);
    let moved = s.engine.get(r.id).await.unwrap();
    assert_eq!(moved.scheduled_time, s.clock.now() + Duration::minutes(90));
}

#[tokio::test]
async fn reschedule_rejects_bad_delay_without_mutation() {
    let s = setup();
    let r = live_call(&s, "u1").await;

    for args in [
        json!({ "reminder_id": r.id, "delay_minutes": -5 }),
        json!({ "reminder_id": r.id, "delay": "whenever" }),
        json!({ "reminder_id": r.id, "delay": "30d" }),
    ] {
        let result = s.bridge.dispatch("reschedule", &args, "u1").await;
        assert!(!result.success, "{:?}", args);
    }
    assert_eq!(
        s.engine.get(r.id).await.unwrap().status,
        ReminderStatus::Pinging
    );
}

#[tokio::test]
async fn reschedule_with_out_of_range_delay_fails_softly() {
    let s = setup();
    let r = live_call(&s, "u1").await;

    for args in [
        json!({ "reminder_id": r.id, "delay_minutes": 1_000_000_000_000_000i64 }),
        json!({ "reminder_id": r.id, "delay_minutes": i64::MAX }),
        json!({ "reminder_id": r.id, "delay": "10000000000000000s" }),
        json!({ "reminder_id": r.id, "delay": "999999999999w" }),
    ] {
        let result = s.bridge.dispatch("reschedule", &args, "u1").await;
        assert!(!result.success, "{:?}", args);
        assert!(result.error.is_some(), "{:?}", args);
    }
    assert_eq!(
        s.engine.get(r.id).await.unwrap().status,
        ReminderStatus::Pinging
    );
}

#[tokio::test]
async fn log_outcome_records_refusal() {
    let s = setup();
    let r = live_call(&s, "u1").await;

    let result = s
        .bridge
        .dispatch(
            "log_outcome",
            &json!({ "reminder_id": r.id, "outcome": "refused", "note": "feels nauseous" }),
            "u1",
        )
        .await;

    assert!(result.success, "{:?}", result);
    let refused = s.engine.get(r.id).await.unwrap();
    assert_eq!(refused.status, ReminderStatus::Refused);
    assert_eq!(refused.outcome_note.as_deref(), Some("feels nauseous"));
}

#[tokio::test]
async fn log_outcome_rejects_delayed() {
    let s = setup();
    let r = live_call(&s, "u1").await;

    let result = s
        .bridge
        .log_outcome("u1", r.id, ReminderOutcome::Delayed, None)
        .await;
    assert!(!result.success);
}

#[tokio::test]
async fn outcome_for_reminder_not_in_a_call_fails_softly() {
    let s = setup();
    let r = s
        .engine
        .create(NewReminder::new("u1", ReminderKind::Medication, s.engine.now()))
        .await
        .unwrap();

    let result = s
        .bridge
        .dispatch("log_success", &json!({ "reminder_id": r.id }), "u1")
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("pending"));
}

#[tokio::test]
async fn other_users_reminder_is_refused() {
    let s = setup();
    let r = live_call(&s, "u1").await;

    let result = s
        .bridge
        .dispatch("log_success", &json!({ "reminder_id": r.id }), "u2")
        .await;

    assert!(!result.success);
    assert_eq!(
        s.engine.get(r.id).await.unwrap().status,
        ReminderStatus::Pinging
    );
}

#[tokio::test]
async fn unknown_tool_and_bad_args_fail_softly() {
    let s = setup();

    let unknown = s.bridge.dispatch("order_pizza", &json!({}), "u1").await;
    assert!(!unknown.success);
    assert!(unknown.error.unwrap().contains("Unknown tool"));

    let bad = s
        .bridge
        .dispatch("log_success", &json!({ "reminder_id": "not-a-uuid" }), "u1")
        .await;
    assert!(!bad.success);

    let missing = s
        .bridge
        .dispatch("log_success", &json!({ "reminder_id": uuid::Uuid::now_v7() }), "u1")
        .await;
    assert_eq!(missing.error.as_deref(), Some("Reminder not found"));
}

#[tokio::test]
async fn every_listed_tool_is_routed() {
    let s = setup();
    for name in TOOL_NAMES {
        let result = s.bridge.dispatch(name, &json!({}), "u1").await;
        let error = result.error.unwrap_or_default();
        assert!(!error.contains("Unknown tool"), "{} is not routed", name);
    }
}

#[tokio::test]
async fn notify_family_reaches_notifier() {
    let s = setup();
    let result = s
        .bridge
        .dispatch(
            "notify_family",
            &json!({ "message": "Dad fell but says he is fine", "urgent": true }),
            "u1",
        )
        .await;

    assert!(result.success, "{:?}", result);
    let sent = s.notifier.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user_id, "u1");
    assert!(sent[0].urgent);
}

#[tokio::test]
async fn vitals_failure_is_reported_not_raised() {
    let s = setup();
    let bridge = s.bridge.clone().with_vitals(Arc::new(FailingVitals));

    let result = bridge
        .dispatch(
            "log_vitals",
            &json!({ "metric": "glucose", "value": 110.0, "unit": "mg/dL" }),
            "u1",
        )
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("vitals service down"));
}

#[tokio::test]
async fn log_vitals_with_default_recorder_succeeds() {
    let s = setup();
    let result = s
        .bridge
        .dispatch("log_vitals", &json!({ "metric": "heart_rate", "value": 72 }), "u1")
        .await;
    assert!(result.success, "{:?}", result);
}
