//! UUID v7 identifiers for reminders.
//!
//! Reminder IDs are UUIDv7 so they sort by creation time (RFC 9562).

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// ```
/// use carecall_core::uuid_utils::new_v7;
///
/// assert_eq!(new_v7().get_version_num(), 7);
/// ```
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}
