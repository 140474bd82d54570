//! Reminder slot definitions.
//!
//! A [`ScheduleConfig`] is fetched from the backend at engine start and at
//! every day rollover; the engine never mutates it.

use crate::clock::LocalClock;
use crate::error::{ChimeError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One configured time-of-day reminder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderSlot {
    /// Stable slot identifier, unique within a day (e.g. `"am"`).
    ///
    /// Used together with the local calendar date for fire-once dedup, so it
    /// must not change from day to day.
    pub key: String,
    /// Wall-clock fire time, `"HH:MM"` in the deployment timezone.
    pub time: String,
    /// Human-readable reminder label.
    pub label: String,
}

impl ReminderSlot {
    /// Absolute fire instant of this slot on the given local date.
    ///
    /// # Errors
    ///
    /// Returns [`ChimeError::InvalidTimeFormat`] for a malformed `time`.
    pub fn fire_instant(&self, clock: &LocalClock, date: NaiveDate) -> Result<DateTime<Utc>> {
        clock.instant_of(date, &self.time)
    }
}

/// The day's reminder slot set plus the catch-up window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScheduleConfig {
    /// Configured reminder slots.
    pub slots: Vec<ReminderSlot>,
    /// Minutes after a slot's instant during which a late-arming engine
    /// still fires it; beyond this the slot is skipped for the day.
    pub grace_minutes: u32,
}

impl ScheduleConfig {
    /// Validate structural invariants: a non-empty slot list with unique keys.
    ///
    /// Slot *times* are deliberately not validated here; a single malformed
    /// slot is skipped at arming time without discarding the rest.
    pub fn validate(&self) -> Result<()> {
        if self.slots.is_empty() {
            return Err(ChimeError::Schedule("slot list is empty".to_owned()));
        }
        let mut seen = HashSet::new();
        for slot in &self.slots {
            if !seen.insert(slot.key.as_str()) {
                return Err(ChimeError::Schedule(format!(
                    "duplicate slot key `{}`",
                    slot.key
                )));
            }
        }
        Ok(())
    }
}
