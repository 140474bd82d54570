//! Bounded, ordered notification log with unread tracking.
//!
//! Newest entries first, capped at [`MAX_ENTRIES`]; the oldest entry is
//! evicted when the cap is exceeded. Unread count is computed against a
//! single last-read watermark, not per-entry flags.

use crate::error::Result;
use crate::store::{self, PersistentStore, keys};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maximum number of retained log entries.
pub const MAX_ENTRIES: usize = 50;

/// Kind of a notification entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Daily time-of-day reminder.
    Reminder,
    /// New assignment detection.
    Assignment,
    /// Follow-up past due.
    Warning,
}

/// One entry in the notification log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEntry {
    /// Unique entry id.
    pub id: String,
    /// Short title.
    pub title: String,
    /// Longer descriptive message.
    pub message: String,
    /// Creation time, epoch milliseconds.
    pub timestamp: u64,
    /// Entry kind.
    pub kind: NotificationKind,
}

impl NotificationEntry {
    /// Create an entry stamped with the current time and a fresh id.
    #[must_use]
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            message: message.into(),
            timestamp: now_epoch_millis(),
            kind,
        }
    }
}

/// Store-backed notification log.
#[derive(Clone)]
pub struct NotificationLog {
    store: Arc<dyn PersistentStore>,
}

impl NotificationLog {
    /// Create a log over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    /// Prepend `entry`, evicting the oldest past [`MAX_ENTRIES`], and persist.
    pub fn add(&self, entry: NotificationEntry) -> Result<()> {
        let mut entries = self.list()?;
        entries.insert(0, entry);
        entries.truncate(MAX_ENTRIES);
        store::put_typed(&self.store, keys::NOTIFICATION_LOG, &entries)
    }

    /// All entries, newest first.
    pub fn list(&self) -> Result<Vec<NotificationEntry>> {
        Ok(store::get_typed(&self.store, keys::NOTIFICATION_LOG)?.unwrap_or_default())
    }

    /// Entries newer than the last-read watermark.
    pub fn unread_count(&self) -> Result<usize> {
        let last_read = self.last_read_at()?;
        let entries = self.list()?;
        Ok(entries.iter().filter(|e| e.timestamp > last_read).count())
    }

    /// Move the last-read watermark to now. Does not alter the log.
    pub fn mark_all_read(&self) -> Result<()> {
        store::put_typed(&self.store, keys::NOTIFICATION_LAST_READ, &now_epoch_millis())
    }

    fn last_read_at(&self) -> Result<u64> {
        Ok(store::get_typed(&self.store, keys::NOTIFICATION_LAST_READ)?.unwrap_or(0))
    }
}

/// Current epoch time in milliseconds.
#[must_use]
pub fn now_epoch_millis() -> u64 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(duration) => u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        Err(_) => 0,
    }
}
