//! In-memory reminder store.
//!
//! Backs tests and single-process deployments without PostgreSQL. All
//! mutations take the write lock, so `update_if` is atomic with respect to
//! every other operation on the same store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use carecall_core::{
    new_v7, Clock, ConditionalUpdate, Error, NewReminder, Reminder, ReminderOrder, ReminderPatch,
    ReminderQuery, ReminderStatus, ReminderStore, Result, SystemClock,
};

/// [`ReminderStore`] over a locked `HashMap`.
#[derive(Clone)]
pub struct MemoryReminderStore {
    reminders: Arc<RwLock<HashMap<Uuid, Reminder>>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryReminderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReminderStore {
    /// Store stamped with the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store stamped with the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            reminders: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Number of stored reminders.
    pub async fn len(&self) -> usize {
        self.reminders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reminders.read().await.is_empty()
    }

    fn sort(reminders: &mut [Reminder], order: ReminderOrder) {
        match order {
            ReminderOrder::ScheduledAsc => {
                reminders.sort_by(|a, b| (a.scheduled_time, a.id).cmp(&(b.scheduled_time, b.id)))
            }
            ReminderOrder::ScheduledDesc => {
                reminders.sort_by(|a, b| (b.scheduled_time, b.id).cmp(&(a.scheduled_time, a.id)))
            }
            ReminderOrder::CreatedDesc => {
                reminders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)))
            }
        }
    }
}

#[async_trait]
impl ReminderStore for MemoryReminderStore {
    async fn create(&self, new: NewReminder) -> Result<Reminder> {
        let now = self.clock.now();
        let reminder = Reminder {
            id: new_v7(),
            user_id: new.user_id,
            kind: new.kind,
            medication_name: new.medication_name,
            about: new.about,
            metadata: new.metadata,
            scheduled_time: new.scheduled_time,
            status: ReminderStatus::Pending,
            is_recurring: new.is_recurring,
            attempts: 0,
            last_outcome: None,
            outcome_note: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            triggered_at: None,
            completed_at: None,
        };

        self.reminders
            .write()
            .await
            .insert(reminder.id, reminder.clone());
        Ok(reminder)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reminder>> {
        Ok(self.reminders.read().await.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, patch: ReminderPatch) -> Result<Reminder> {
        let now = self.clock.now();
        let mut reminders = self.reminders.write().await;
        let reminder = reminders
            .get_mut(&id)
            .ok_or_else(|| Error::reminder_not_found(id))?;

        patch.apply_to(reminder, now);
        Ok(reminder.clone())
    }

    async fn update_if(
        &self,
        id: Uuid,
        expected: ReminderStatus,
        patch: ReminderPatch,
    ) -> Result<ConditionalUpdate> {
        let now = self.clock.now();
        let mut reminders = self.reminders.write().await;
        let reminder = reminders
            .get_mut(&id)
            .ok_or_else(|| Error::reminder_not_found(id))?;

        if reminder.status != expected {
            return Ok(ConditionalUpdate::StatusMismatch {
                actual: reminder.status,
            });
        }

        patch.apply_to(reminder, now);
        Ok(ConditionalUpdate::Applied(reminder.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.reminders
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::reminder_not_found(id))
    }

    async fn query(&self, query: ReminderQuery) -> Result<Vec<Reminder>> {
        let mut matched: Vec<Reminder> = self
            .reminders
            .read()
            .await
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();

        Self::sort(&mut matched, query.order);

        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let limit = query
            .limit
            .map(|l| l.max(0) as usize)
            .unwrap_or(usize::MAX);

        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, query: ReminderQuery) -> Result<i64> {
        let count = self
            .reminders
            .read()
            .await
            .values()
            .filter(|r| query.matches(r))
            .count();
        Ok(count as i64)
    }
}
