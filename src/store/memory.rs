//! In-memory store for tests and ephemeral runs.

use crate::error::{ChimeError, Result};
use crate::store::PersistentStore;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// In-memory implementation of [`PersistentStore`]. Nothing survives drop.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| ChimeError::Store("memory store lock poisoned".to_owned()))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ChimeError::Store("memory store lock poisoned".to_owned()))?;
        entries.insert(key.to_owned(), value);
        Ok(())
    }
}
