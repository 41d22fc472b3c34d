//! Per-user reminder listings.

use std::sync::Arc;

use tracing::debug;

use carecall_core::{
    Error, Reminder, ReminderOrder, ReminderQuery, ReminderStatus, ReminderStore, Result,
};

/// Read-only views over a user's reminders.
#[derive(Clone)]
pub struct ReminderQueries {
    store: Arc<dyn ReminderStore>,
}

impl ReminderQueries {
    pub fn new(store: Arc<dyn ReminderStore>) -> Self {
        Self { store }
    }

    /// All pending reminders for the user, soonest first.
    pub async fn list_pending(&self, user_id: &str) -> Result<Vec<Reminder>> {
        let query = ReminderQuery::for_user(validate_user(user_id)?)
            .with_status(ReminderStatus::Pending)
            .ordered(ReminderOrder::ScheduledAsc);

        let reminders = self.store.query(query).await?;
        debug!(
            subsystem = "scheduler",
            component = "queries",
            op = "list_pending",
            user_id,
            result_count = reminders.len(),
            "Listed pending reminders"
        );
        Ok(reminders)
    }

    /// The user's reminder history, most recently scheduled first.
    pub async fn list_by_user(
        &self,
        user_id: &str,
        status: Option<ReminderStatus>,
    ) -> Result<Vec<Reminder>> {
        let mut query =
            ReminderQuery::for_user(validate_user(user_id)?).ordered(ReminderOrder::ScheduledDesc);
        if let Some(status) = status {
            query = query.with_status(status);
        }

        let reminders = self.store.query(query).await?;
        debug!(
            subsystem = "scheduler",
            component = "queries",
            op = "list_by_user",
            user_id,
            status = ?status,
            result_count = reminders.len(),
            "Listed reminders"
        );
        Ok(reminders)
    }

    /// Number of pending reminders for the user.
    pub async fn pending_count(&self, user_id: &str) -> Result<usize> {
        let query =
            ReminderQuery::for_user(validate_user(user_id)?).with_status(ReminderStatus::Pending);
        let count = self.store.count(query).await?;
        Ok(count.max(0) as usize)
    }

    /// The user's soonest pending reminder, if any.
    pub async fn next_pending(&self, user_id: &str) -> Result<Option<Reminder>> {
        let query = ReminderQuery::for_user(validate_user(user_id)?)
            .with_status(ReminderStatus::Pending)
            .ordered(ReminderOrder::ScheduledAsc)
            .limit(1);
        Ok(self.store.query(query).await?.into_iter().next())
    }
}

fn validate_user(user_id: &str) -> Result<&str> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("user_id is required".to_string()));
    }
    Ok(trimmed)
}
