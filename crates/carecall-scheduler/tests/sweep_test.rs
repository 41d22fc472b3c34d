//! Call dispatch during sweeps and the periodic sweep worker.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use carecall_core::{
    CallDispatcher, ConditionalUpdate, Error, ManualClock, NewReminder, Reminder, ReminderKind,
    ReminderPatch, ReminderQuery, ReminderStatus, ReminderStore, Result,
};
use carecall_db::MemoryReminderStore;
use carecall_scheduler::{DueScanner, ReminderEngine, SweepConfig, SweepEvent, SweepWorker};

/// Records dispatched reminders and fails for one chosen user.
#[derive(Default)]
struct RecordingDispatcher {
    calls: Mutex<Vec<Uuid>>,
    fail_for_user: Option<String>,
}

#[async_trait]
impl CallDispatcher for RecordingDispatcher {
    async fn dispatch(&self, reminder: &Reminder) -> Result<()> {
        self.calls.lock().await.push(reminder.id);
        if self.fail_for_user.as_deref() == Some(reminder.user_id.as_str()) {
            return Err(Error::Internal("no phone number on file".into()));
        }
        Ok(())
    }
}

/// Store whose queries always fail.
struct DownStore {
    queries: AtomicUsize,
}

#[async_trait]
impl ReminderStore for DownStore {
    async fn create(&self, _new: NewReminder) -> Result<Reminder> {
        Err(Error::StoreUnavailable("connection refused".into()))
    }
    async fn get(&self, _id: Uuid) -> Result<Option<Reminder>> {
        Err(Error::StoreUnavailable("connection refused".into()))
    }
    async fn update(
        &self,
        _id: Uuid,
        _patch: ReminderPatch,
    ) -> Result<Reminder> {
        Err(Error::StoreUnavailable("connection refused".into()))
    }
    async fn update_if(
        &self,
        _id: Uuid,
        _expected: ReminderStatus,
        _patch: ReminderPatch,
    ) -> Result<ConditionalUpdate> {
        Err(Error::StoreUnavailable("connection refused".into()))
    }
    async fn delete(&self, _id: Uuid) -> Result<()> {
        Err(Error::StoreUnavailable("connection refused".into()))
    }
    async fn query(&self, _query: ReminderQuery) -> Result<Vec<Reminder>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Err(Error::StoreUnavailable("connection refused".into()))
    }
    async fn count(&self, _query: ReminderQuery) -> Result<i64> {
        Err(Error::StoreUnavailable("connection refused".into()))
    }
}

/// Memory store that fails conditional updates for one chosen reminder and
/// can report an undecodable row on queries.
struct FaultyStore {
    inner: MemoryReminderStore,
    fail_update_for: std::sync::Mutex<Option<Uuid>>,
    corrupt_rows: AtomicBool,
}

impl FaultyStore {
    fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            inner: MemoryReminderStore::with_clock(clock),
            fail_update_for: std::sync::Mutex::new(None),
            corrupt_rows: AtomicBool::new(false),
        }
    }

    fn fail_updates_for(&self, id: Uuid) {
        *self.fail_update_for.lock().unwrap() = Some(id);
    }
}

#[async_trait]
impl ReminderStore for FaultyStore {
    async fn create(&self, new: NewReminder) -> Result<Reminder> {
        self.inner.create(new).await
    }
    async fn get(&self, id: Uuid) -> Result<Option<Reminder>> {
        self.inner.get(id).await
    }
    async fn update(&self, id: Uuid, patch: ReminderPatch) -> Result<Reminder> {
        self.inner.update(id, patch).await
    }
    async fn update_if(
        &self,
        id: Uuid,
        expected: ReminderStatus,
        patch: ReminderPatch,
    ) -> Result<ConditionalUpdate> {
        if *self.fail_update_for.lock().unwrap() == Some(id) {
            return Err(Error::StoreUnavailable("write timed out".into()));
        }
        self.inner.update_if(id, expected, patch).await
    }
    async fn delete(&self, id: Uuid) -> Result<()> {
        self.inner.delete(id).await
    }
    async fn query(&self, query: ReminderQuery) -> Result<Vec<Reminder>> {
        if self.corrupt_rows.load(Ordering::SeqCst) {
            return Err(Error::Serialization("invalid kind in row".into()));
        }
        self.inner.query(query).await
    }
    async fn count(&self, query: ReminderQuery) -> Result<i64> {
        self.inner.count(query).await
    }
}

fn nine_am() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
}

fn engine_at_nine() -> ReminderEngine {
    let clock = Arc::new(ManualClock::new(nine_am()));
    ReminderEngine::with_clock(
        Arc::new(MemoryReminderStore::with_clock(clock.clone())),
        clock,
    )
}

async fn due_reminder(engine: &ReminderEngine, user: &str) -> Reminder {
    engine
        .create(NewReminder::new(user, ReminderKind::CheckIn, nine_am()))
        .await
        .unwrap()
}

#[tokio::test]
async fn triggered_reminders_are_dispatched() {
    let engine = engine_at_nine();
    let a = due_reminder(&engine, "u1").await;
    let b = due_reminder(&engine, "u2").await;

    let dispatcher = Arc::new(RecordingDispatcher::default());
    let scanner = DueScanner::new(engine.clone()).with_dispatcher(dispatcher.clone());

    let report = scanner.sweep_now().await.unwrap();
    assert_eq!(report.triggered, 2);

    let mut calls = dispatcher.calls.lock().await.clone();
    calls.sort();
    let mut expected = vec![a.id, b.id];
    expected.sort();
    assert_eq!(calls, expected);
}

#[tokio::test]
async fn dispatch_failure_marks_error_but_counts_as_triggered() {
    let engine = engine_at_nine();
    let ok = due_reminder(&engine, "u1").await;
    let broken = due_reminder(&engine, "no-phone").await;

    let dispatcher = Arc::new(RecordingDispatcher {
        calls: Mutex::new(Vec::new()),
        fail_for_user: Some("no-phone".to_string()),
    });
    let scanner = DueScanner::new(engine.clone()).with_dispatcher(dispatcher);

    let report = scanner.sweep_now().await.unwrap();
    assert_eq!(report.triggered, 2);
    assert_eq!(report.failed, 0);

    assert_eq!(
        engine.get(ok.id).await.unwrap().status,
        ReminderStatus::Pinging
    );
    let broken = engine.get(broken.id).await.unwrap();
    assert_eq!(broken.status, ReminderStatus::Error);
    assert!(broken
        .error_message
        .unwrap()
        .contains("no phone number on file"));
}

#[tokio::test]
async fn query_failure_fails_the_sweep() {
    let engine = ReminderEngine::new(Arc::new(DownStore {
        queries: AtomicUsize::new(0),
    }));
    let err = DueScanner::new(engine).sweep(nine_am()).await.unwrap_err();
    assert!(matches!(err, Error::StoreUnavailable(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn one_failing_reminder_does_not_stop_the_rest() {
    let clock = Arc::new(ManualClock::new(nine_am()));
    let store = Arc::new(FaultyStore::new(clock.clone()));
    let engine = ReminderEngine::with_clock(store.clone(), clock);

    let first = due_reminder(&engine, "u1").await;
    let stuck = due_reminder(&engine, "u2").await;
    let third = due_reminder(&engine, "u3").await;
    store.fail_updates_for(stuck.id);

    let report = DueScanner::new(engine.clone()).sweep_now().await.unwrap();
    assert_eq!(report.triggered, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 0);
    assert!(!report.triggered_ids.contains(&stuck.id));

    for r in [&first, &third] {
        assert_eq!(
            engine.get(r.id).await.unwrap().status,
            ReminderStatus::Pinging
        );
    }
    assert_eq!(
        engine.get(stuck.id).await.unwrap().status,
        ReminderStatus::Pending
    );
}

#[tokio::test]
async fn undecodable_row_error_is_not_reported_as_retryable() {
    let clock = Arc::new(ManualClock::new(nine_am()));
    let store = Arc::new(FaultyStore::new(clock.clone()));
    let engine = ReminderEngine::with_clock(store.clone(), clock);
    due_reminder(&engine, "u1").await;
    store.corrupt_rows.store(true, Ordering::SeqCst);

    let err = DueScanner::new(engine).sweep(nine_am()).await.unwrap_err();
    assert!(matches!(err, Error::Serialization(_)), "{:?}", err);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn worker_sweeps_and_stops() {
    let engine = engine_at_nine();
    let reminder = due_reminder(&engine, "u1").await;

    let worker = SweepWorker::new(
        DueScanner::new(engine.clone()),
        SweepConfig::default()
            .with_enabled(true)
            .with_interval_secs(3600),
    );
    let mut events = worker.subscribe();
    let handle = worker.start();

    assert!(matches!(events.recv().await.unwrap(), SweepEvent::WorkerStarted));
    match events.recv().await.unwrap() {
        SweepEvent::SweepCompleted(report) => {
            assert_eq!(report.triggered_ids, vec![reminder.id]);
        }
        other => panic!("expected SweepCompleted, got {:?}", other),
    }

    handle.shutdown().await.unwrap();
    assert!(matches!(events.recv().await.unwrap(), SweepEvent::WorkerStopped));
    assert_eq!(
        engine.get(reminder.id).await.unwrap().status,
        ReminderStatus::Pinging
    );
}

#[tokio::test]
async fn worker_reports_failed_sweeps() {
    let store = Arc::new(DownStore {
        queries: AtomicUsize::new(0),
    });
    let engine = ReminderEngine::new(store.clone());
    let worker = SweepWorker::new(
        DueScanner::new(engine),
        SweepConfig::default().with_enabled(true),
    );
    let mut events = worker.subscribe();
    let handle = worker.start();

    assert!(matches!(events.recv().await.unwrap(), SweepEvent::WorkerStarted));
    match events.recv().await.unwrap() {
        SweepEvent::SweepFailed { error } => assert!(error.contains("connection refused")),
        other => panic!("expected SweepFailed, got {:?}", other),
    }
    handle.shutdown().await.unwrap();
    assert_eq!(store.queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn disabled_worker_never_sweeps() {
    let store = Arc::new(DownStore {
        queries: AtomicUsize::new(0),
    });
    let engine = ReminderEngine::new(store.clone());
    let worker = SweepWorker::new(DueScanner::new(engine), SweepConfig::default());
    let mut events = worker.subscribe();
    let _handle = worker.start();

    // The run task exits immediately and drops the sender.
    assert!(events.recv().await.is_err());
    assert_eq!(store.queries.load(Ordering::SeqCst), 0);
}
