//! Per-category notification toggles.
//!
//! The three categories (reminders, assignments, follow-ups) can be
//! enabled or disabled independently while the engine runs. Toggles are
//! persisted through the principal's store and read fresh at every fire and
//! poll decision, so a change takes effect without a restart.

use crate::error::Result;
use crate::store::{self, PersistentStore, keys};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Notification category, matching the entry kinds the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    /// Daily time-of-day reminders.
    Reminders,
    /// New assignment detection.
    Assignments,
    /// Follow-up-due alerts.
    FollowUps,
}

/// Persisted toggle state. Everything defaults to enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Daily reminders enabled.
    pub reminders: bool,
    /// Assignment notifications enabled.
    pub assignments: bool,
    /// Follow-up-due notifications enabled.
    pub follow_ups: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            reminders: true,
            assignments: true,
            follow_ups: true,
        }
    }
}

impl NotificationSettings {
    /// Whether the given category is enabled.
    #[must_use]
    pub fn is_enabled(&self, category: NotificationCategory) -> bool {
        match category {
            NotificationCategory::Reminders => self.reminders,
            NotificationCategory::Assignments => self.assignments,
            NotificationCategory::FollowUps => self.follow_ups,
        }
    }
}

/// Store-backed settings accessor shared across the engine.
#[derive(Clone)]
pub struct SettingsHandle {
    store: Arc<dyn PersistentStore>,
}

impl SettingsHandle {
    /// Create a settings handle over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    /// Current settings, defaults when none were ever saved.
    pub fn get(&self) -> Result<NotificationSettings> {
        Ok(store::get_typed(&self.store, keys::SETTINGS)?.unwrap_or_default())
    }

    /// Enable or disable one category, persisting the change.
    pub fn set(&self, category: NotificationCategory, enabled: bool) -> Result<()> {
        let mut settings = self.get()?;
        match category {
            NotificationCategory::Reminders => settings.reminders = enabled,
            NotificationCategory::Assignments => settings.assignments = enabled,
            NotificationCategory::FollowUps => settings.follow_ups = enabled,
        }
        store::put_typed(&self.store, keys::SETTINGS, &settings)
    }

    /// Convenience: whether `category` is currently enabled.
    pub fn is_enabled(&self, category: NotificationCategory) -> Result<bool> {
        Ok(self.get()?.is_enabled(category))
    }
}
