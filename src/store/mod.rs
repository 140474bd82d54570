//! Persistent key/value state for one principal.
//!
//! All engine state that must survive a restart (dedup records, assignment
//! snapshots, the notification log, settings) goes through the
//! [`PersistentStore`] trait so tests can inject an in-memory store. Keys
//! follow the naming scheme in [`keys`].

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// String-keyed JSON document store.
///
/// Implementations must make `put` durable before returning; the engine
/// relies on that for its at-most-once fire guarantees across restarts.
pub trait PersistentStore: Send + Sync {
    /// Read the value stored under `key`, or `None` when absent.
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Write `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: serde_json::Value) -> Result<()>;

    /// Returns `true` when `key` has a stored value.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Typed read helper over [`PersistentStore::get`].
pub fn get_typed<T: DeserializeOwned>(
    store: &Arc<dyn PersistentStore>,
    key: &str,
) -> Result<Option<T>> {
    match store.get(key)? {
        None => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| crate::error::ChimeError::Store(format!("cannot decode `{key}`: {e}"))),
    }
}

/// Typed write helper over [`PersistentStore::put`].
pub fn put_typed<T: Serialize>(
    store: &Arc<dyn PersistentStore>,
    key: &str,
    value: &T,
) -> Result<()> {
    let json = serde_json::to_value(value)
        .map_err(|e| crate::error::ChimeError::Store(format!("cannot encode `{key}`: {e}")))?;
    store.put(key, json)
}

/// Key-naming scheme, one prefix per record type.
pub mod keys {
    use chrono::NaiveDate;

    /// Fired flag for a daily reminder slot.
    #[must_use]
    pub fn slot_fired(date: NaiveDate, slot_key: &str) -> String {
        format!("slot_fired:{date}:{slot_key}")
    }

    /// Fired flag for a follow-up-due event, keyed by its natural key.
    #[must_use]
    pub fn follow_up_fired(
        owner_id: &str,
        batch: &str,
        sheet: &str,
        lead_id: &str,
        sequence: u32,
        due_epoch: i64,
    ) -> String {
        format!("followup_fired:{owner_id}:{batch}:{sheet}:{lead_id}:{sequence}:{due_epoch}")
    }

    /// Last-observed assignment snapshot for an owner.
    #[must_use]
    pub fn assignment_snapshot(owner_id: &str) -> String {
        format!("assignment_snapshot:{owner_id}")
    }

    /// The bounded notification log.
    pub const NOTIFICATION_LOG: &str = "notification_log";

    /// Epoch-millisecond watermark for the unread computation.
    pub const NOTIFICATION_LAST_READ: &str = "notification_last_read";

    /// Per-category notification toggles.
    pub const SETTINGS: &str = "settings";
}
