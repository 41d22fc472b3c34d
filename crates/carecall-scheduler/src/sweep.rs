//! Due-scan sweeps and the periodic sweep worker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

use carecall_core::{
    defaults, CallDispatcher, Error, NoOpDispatcher, Reminder, ReminderQuery, Result, SweepReport,
};

use crate::lifecycle::ReminderEngine;

/// What happened to one due reminder during a sweep.
#[derive(Debug)]
enum TriggerOutcome {
    Triggered(Uuid),
    Skipped,
    Failed,
}

/// Finds due reminders and triggers each one.
#[derive(Clone)]
pub struct DueScanner {
    engine: ReminderEngine,
    dispatcher: Arc<dyn CallDispatcher>,
    max_concurrent: usize,
}

impl DueScanner {
    /// Scanner that triggers reminders without placing calls.
    pub fn new(engine: ReminderEngine) -> Self {
        Self {
            engine,
            dispatcher: Arc::new(NoOpDispatcher),
            max_concurrent: defaults::SWEEP_MAX_CONCURRENT,
        }
    }

    /// Hand every triggered reminder to `dispatcher`.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn CallDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Set how many reminders are triggered concurrently.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn engine(&self) -> &ReminderEngine {
        &self.engine
    }

    /// Sweep using the engine's clock.
    pub async fn sweep_now(&self) -> Result<SweepReport> {
        self.sweep(self.engine.now()).await
    }

    /// Trigger every `pending` reminder scheduled at or before `now`.
    ///
    /// Only the initial query can fail the sweep, and its error is returned
    /// as the store reported it. Per-reminder problems are counted in the
    /// report: reminders another sweeper claimed first or that were
    /// cancelled mid-sweep are `skipped`, anything else is `failed`.
    #[instrument(skip(self), fields(subsystem = "scheduler", component = "sweep", op = "sweep"))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let start = Instant::now();

        let due = self
            .engine
            .store()
            .query(ReminderQuery::due(now))
            .await?;

        let mut report = SweepReport::empty(now);
        if due.is_empty() {
            debug!("No due reminders");
            return Ok(report);
        }

        debug!(due = due.len(), "Triggering due reminders");

        let mut outcomes: Vec<(usize, TriggerOutcome)> = stream::iter(due.into_iter().enumerate())
            .map(|(idx, reminder)| async move { (idx, self.trigger_one(reminder).await) })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        // Report triggered ids in due order.
        outcomes.sort_by_key(|(idx, _)| *idx);
        for (_, outcome) in outcomes {
            match outcome {
                TriggerOutcome::Triggered(id) => {
                    report.triggered += 1;
                    report.triggered_ids.push(id);
                }
                TriggerOutcome::Skipped => report.skipped += 1,
                TriggerOutcome::Failed => report.failed += 1,
            }
        }

        info!(
            triggered = report.triggered,
            skipped = report.skipped,
            failed = report.failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Sweep completed"
        );
        Ok(report)
    }

    async fn trigger_one(&self, reminder: Reminder) -> TriggerOutcome {
        trace!(reminder_id = %reminder.id, user_id = %reminder.user_id, "Triggering reminder");

        let triggered = match self.engine.mark_triggered(reminder.id).await {
            Ok(triggered) => triggered,
            Err(Error::InvalidTransition { .. }) | Err(Error::NotFound(_)) => {
                debug!(reminder_id = %reminder.id, "Reminder no longer due, skipping");
                return TriggerOutcome::Skipped;
            }
            Err(e) => {
                warn!(reminder_id = %reminder.id, error = %e, "Failed to trigger reminder");
                return TriggerOutcome::Failed;
            }
        };

        if let Err(e) = self.dispatcher.dispatch(&triggered).await {
            warn!(reminder_id = %triggered.id, error = %e, "Call dispatch failed");
            if let Err(mark_err) = self
                .engine
                .mark_error(triggered.id, format!("Call dispatch failed: {}", e))
                .await
            {
                error!(
                    reminder_id = %triggered.id,
                    error = %mark_err,
                    "Failed to record dispatch failure"
                );
            }
        }

        TriggerOutcome::Triggered(triggered.id)
    }
}

// =============================================================================
// SWEEP WORKER
// =============================================================================

/// Configuration for the periodic sweep worker.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Seconds between sweeps.
    pub interval_secs: u64,
    /// Reminders triggered concurrently within a sweep.
    pub max_concurrent: usize,
    /// Whether to run sweeps at all.
    pub enabled: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::SWEEP_INTERVAL_SECS,
            max_concurrent: defaults::SWEEP_MAX_CONCURRENT,
            enabled: false,
        }
    }
}

impl SweepConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SWEEP_ENABLED` | `false` | Run sweeps in-process |
    /// | `SWEEP_INTERVAL_SECS` | `300` | Seconds between sweeps |
    /// | `SWEEP_MAX_CONCURRENT` | `8` | Reminders triggered concurrently |
    pub fn from_env() -> Self {
        let enabled = std::env::var("SWEEP_ENABLED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let interval_secs = std::env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::SWEEP_INTERVAL_SECS)
            .max(1);

        let max_concurrent = std::env::var("SWEEP_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::SWEEP_MAX_CONCURRENT)
            .max(1);

        Self {
            interval_secs,
            max_concurrent,
            enabled,
        }
    }

    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = secs.max(1);
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the sweep worker.
#[derive(Debug, Clone)]
pub enum SweepEvent {
    WorkerStarted,
    SweepCompleted(SweepReport),
    SweepFailed { error: String },
    WorkerStopped,
}

/// Handle for controlling a running sweep worker.
pub struct SweepHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<SweepEvent>,
}

impl SweepHandle {
    /// Signal the worker to stop after the current sweep.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<SweepEvent> {
        self.event_rx.resubscribe()
    }
}

/// Runs [`DueScanner::sweep_now`] on a fixed interval.
pub struct SweepWorker {
    scanner: DueScanner,
    config: SweepConfig,
    event_tx: broadcast::Sender<SweepEvent>,
}

impl SweepWorker {
    pub fn new(scanner: DueScanner, config: SweepConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::SWEEP_EVENT_CAPACITY);
        let scanner = scanner.with_max_concurrent(config.max_concurrent);
        Self {
            scanner,
            config,
            event_tx,
        }
    }

    /// Subscribe before [`SweepWorker::start`] to observe every event.
    pub fn subscribe(&self) -> broadcast::Receiver<SweepEvent> {
        self.event_tx.subscribe()
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> SweepHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        SweepHandle {
            shutdown_tx,
            event_rx,
        }
    }

    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!(subsystem = "scheduler", component = "sweep", "Sweep worker is disabled, not starting");
            return;
        }

        info!(
            subsystem = "scheduler",
            component = "sweep",
            interval_secs = self.config.interval_secs,
            max_concurrent = self.config.max_concurrent,
            "Sweep worker started"
        );
        let _ = self.event_tx.send(SweepEvent::WorkerStarted);

        let interval = Duration::from_secs(self.config.interval_secs);

        loop {
            match self.scanner.sweep_now().await {
                Ok(report) => {
                    let _ = self.event_tx.send(SweepEvent::SweepCompleted(report));
                }
                Err(e) => {
                    error!(subsystem = "scheduler", component = "sweep", error = %e, "Sweep failed");
                    let _ = self.event_tx.send(SweepEvent::SweepFailed {
                        error: e.to_string(),
                    });
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(subsystem = "scheduler", component = "sweep", "Sweep worker received shutdown signal");
                    break;
                }
                _ = sleep(interval) => {}
            }
        }

        let _ = self.event_tx.send(SweepEvent::WorkerStopped);
        info!(subsystem = "scheduler", component = "sweep", "Sweep worker stopped");
    }
}
