use std::sync::Arc;

use carecall_core::{CallDispatcher, Clock, ReminderStore};
use carecall_scheduler::{DueScanner, ReminderEngine, ReminderQueries, ToolBridge};

use crate::config::StoreBackend;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: ReminderEngine,
    pub scanner: DueScanner,
    pub queries: ReminderQueries,
    pub tools: ToolBridge,
    /// Reported by `/health`.
    pub store_backend: StoreBackend,
}

impl AppState {
    /// Wire every service over `store` with the system clock.
    pub fn new(store: Arc<dyn ReminderStore>, store_backend: StoreBackend) -> Self {
        Self::from_engine(ReminderEngine::new(store), store_backend)
    }

    /// Wire every service over `store` with an injected clock.
    pub fn with_clock(
        store: Arc<dyn ReminderStore>,
        clock: Arc<dyn Clock>,
        store_backend: StoreBackend,
    ) -> Self {
        Self::from_engine(ReminderEngine::with_clock(store, clock), store_backend)
    }

    fn from_engine(engine: ReminderEngine, store_backend: StoreBackend) -> Self {
        Self {
            scanner: DueScanner::new(engine.clone()),
            queries: ReminderQueries::new(engine.store().clone()),
            tools: ToolBridge::new(engine.clone()),
            engine,
            store_backend,
        }
    }

    /// Place calls for reminders triggered through this state's scanner.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn CallDispatcher>) -> Self {
        self.scanner = self.scanner.with_dispatcher(dispatcher);
        self
    }
}
