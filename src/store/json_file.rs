//! File-backed store: one JSON document per principal.
//!
//! The whole keyspace lives in a single JSON object. Writes rewrite the
//! document through a temp file followed by a rename so a crash mid-write
//! leaves the previous state intact. A missing file reads as an empty store;
//! malformed content is logged and treated as empty rather than aborting the
//! engine.

use crate::error::{ChimeError, Result};
use crate::store::PersistentStore;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// JSON-file implementation of [`PersistentStore`].
pub struct JsonFileStore {
    path: PathBuf,
    cache: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: PathBuf) -> Result<Self> {
        let cache = load_document(&path)?;
        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    fn persist(&self, cache: &BTreeMap<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ChimeError::Store(format!("cannot create state dir: {e}")))?;
        }

        let json = serde_json::to_vec_pretty(cache)
            .map_err(|e| ChimeError::Store(format!("cannot serialize state: {e}")))?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json)
            .map_err(|e| ChimeError::Store(format!("cannot write state temp file: {e}")))?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| ChimeError::Store(format!("cannot finalize state file: {e}")))?;
        Ok(())
    }
}

impl PersistentStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let cache = self
            .cache
            .lock()
            .map_err(|_| ChimeError::Store("state cache lock poisoned".to_owned()))?;
        Ok(cache.get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> Result<()> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| ChimeError::Store("state cache lock poisoned".to_owned()))?;
        cache.insert(key.to_owned(), value);
        self.persist(&cache)
    }
}

fn load_document(path: &PathBuf) -> Result<BTreeMap<String, Value>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(ChimeError::Store(format!("cannot read state file: {e}"))),
    };

    match serde_json::from_slice(&bytes) {
        Ok(map) => Ok(map),
        Err(e) => {
            warn!("ignoring malformed state file at {}: {e}", path.display());
            Ok(BTreeMap::new())
        }
    }
}
