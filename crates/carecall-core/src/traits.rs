//! Core traits for carecall abstractions.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Persistence for reminders.
///
/// Implementations assign `id`, `created_at`, `updated_at` and resolve
/// [`Stamp::Now`] against their own clock. `update_if` must be atomic: the
/// status check and the write happen as one step so concurrent sweepers
/// cannot both claim the same reminder.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Insert a new reminder in `pending` status.
    async fn create(&self, new: NewReminder) -> Result<Reminder>;

    /// Get a reminder by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Reminder>>;

    /// Apply a patch unconditionally. `NotFound` if the record is missing.
    async fn update(&self, id: Uuid, patch: ReminderPatch) -> Result<Reminder>;

    /// Apply a patch only if the current status equals `expected`.
    ///
    /// Returns `NotFound` if the record is missing.
    async fn update_if(
        &self,
        id: Uuid,
        expected: ReminderStatus,
        patch: ReminderPatch,
    ) -> Result<ConditionalUpdate>;

    /// Hard-delete a reminder. `NotFound` if the record is missing.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Query reminders by filter, in the requested order.
    async fn query(&self, query: ReminderQuery) -> Result<Vec<Reminder>>;

    /// Count reminders matching a filter. Ordering and paging are ignored.
    async fn count(&self, query: ReminderQuery) -> Result<i64>;
}

// =============================================================================
// CALL DISPATCH
// =============================================================================

/// Starts an outbound call for a triggered reminder.
///
/// Telephony is an external collaborator; this is the seam the sweep hands
/// each triggered reminder to.
#[async_trait]
pub trait CallDispatcher: Send + Sync {
    /// Place the call. An error marks the reminder as `error`.
    async fn dispatch(&self, reminder: &Reminder) -> Result<()>;
}

/// Dispatcher that only logs. Used when no telephony is configured.
pub struct NoOpDispatcher;

#[async_trait]
impl CallDispatcher for NoOpDispatcher {
    async fn dispatch(&self, reminder: &Reminder) -> Result<()> {
        tracing::debug!(
            reminder_id = %reminder.id,
            user_id = %reminder.user_id,
            "No call dispatcher configured, skipping call"
        );
        Ok(())
    }
}

// =============================================================================
// TOOL-CALL SIDE EFFECTS
// =============================================================================

/// Delivers messages to a senior's family.
#[async_trait]
pub trait FamilyNotifier: Send + Sync {
    async fn notify(&self, notification: &FamilyNotification) -> Result<()>;
}

/// No-op notifier for when family alerts aren't wired up.
pub struct NoOpFamilyNotifier;

#[async_trait]
impl FamilyNotifier for NoOpFamilyNotifier {
    async fn notify(&self, _notification: &FamilyNotification) -> Result<()> {
        Ok(())
    }
}

/// Records vitals reported during a call.
#[async_trait]
pub trait VitalsRecorder: Send + Sync {
    async fn record(&self, reading: &VitalsReading) -> Result<()>;
}

/// No-op recorder for when vitals storage isn't wired up.
pub struct NoOpVitalsRecorder;

#[async_trait]
impl VitalsRecorder for NoOpVitalsRecorder {
    async fn record(&self, _reading: &VitalsReading) -> Result<()> {
        Ok(())
    }
}
