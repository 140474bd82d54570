//! Added-since-last-seen detection for grouped collections.
//!
//! [`diff_added`] is a pure set operation; [`SnapshotStore`] persists the
//! last-observed snapshot per owner. The caller persists the new snapshot
//! only *after* emitting notifications for the additions; a crash between
//! the two re-detects the same ids on restart (accepted at-least-once).

use crate::error::Result;
use crate::store::{self, PersistentStore, keys};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Mapping from a group key (e.g. `batch||sheet`) to the item ids observed
/// in that group.
pub type GroupSnapshot = BTreeMap<String, BTreeSet<String>>;

/// Compose the group key for a `(batch, sheet)` pair.
#[must_use]
pub fn group_key(batch: &str, sheet: &str) -> String {
    format!("{batch}||{sheet}")
}

/// Ids present in `current` but not in `previous`, per group.
///
/// Groups present only in `previous` are ignored; there is no "removed"
/// signal. Groups whose added set is empty are not emitted.
#[must_use]
pub fn diff_added(previous: &GroupSnapshot, current: &GroupSnapshot) -> GroupSnapshot {
    let mut added = GroupSnapshot::new();
    for (group, ids) in current {
        let fresh: BTreeSet<String> = match previous.get(group) {
            Some(seen) => ids.difference(seen).cloned().collect(),
            None => ids.clone(),
        };
        if !fresh.is_empty() {
            added.insert(group.clone(), fresh);
        }
    }
    added
}

/// Persisted per-owner snapshots over the principal's store.
#[derive(Clone)]
pub struct SnapshotStore {
    store: Arc<dyn PersistentStore>,
}

impl SnapshotStore {
    /// Create a snapshot store over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    /// The last persisted snapshot for `owner_id`, empty when none exists.
    pub fn load(&self, owner_id: &str) -> Result<GroupSnapshot> {
        Ok(store::get_typed(&self.store, &keys::assignment_snapshot(owner_id))?.unwrap_or_default())
    }

    /// Replace the persisted snapshot for `owner_id` wholesale.
    ///
    /// Replacement (not merge) is what lets removed items silently drop out
    /// of future new-item detection.
    pub fn replace(&self, owner_id: &str, snapshot: &GroupSnapshot) -> Result<()> {
        store::put_typed(&self.store, &keys::assignment_snapshot(owner_id), snapshot)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::store::MemoryStore;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn diff_detects_additions_and_new_groups() {
        let previous = GroupSnapshot::from([("A".to_owned(), set(&["1", "2"]))]);
        let current = GroupSnapshot::from([
            ("A".to_owned(), set(&["1", "2", "3"])),
            ("B".to_owned(), set(&["9"])),
        ]);

        let added = diff_added(&previous, &current);
        assert_eq!(added.len(), 2);
        assert_eq!(added["A"], set(&["3"]));
        assert_eq!(added["B"], set(&["9"]));
    }

    #[test]
    fn identical_sets_emit_no_groups() {
        let previous = GroupSnapshot::from([("A".to_owned(), set(&["1", "2"]))]);
        let current = previous.clone();
        assert!(diff_added(&previous, &current).is_empty());
    }

    #[test]
    fn removed_groups_and_ids_are_ignored() {
        let previous = GroupSnapshot::from([
            ("A".to_owned(), set(&["1", "2"])),
            ("gone".to_owned(), set(&["x"])),
        ]);
        let current = GroupSnapshot::from([("A".to_owned(), set(&["2"]))]);
        assert!(diff_added(&previous, &current).is_empty());
    }

    #[test]
    fn removed_then_readded_id_is_detected_again() {
        let store = SnapshotStore::new(Arc::new(MemoryStore::new()));

        let first = GroupSnapshot::from([("A".to_owned(), set(&["1"]))]);
        store.replace("owner", &first).unwrap();

        // Item 1 disappears; the replace drops it from the baseline.
        let second = GroupSnapshot::from([("A".to_owned(), set(&[]))]);
        store.replace("owner", &second).unwrap();

        let current = GroupSnapshot::from([("A".to_owned(), set(&["1"]))]);
        let added = diff_added(&store.load("owner").unwrap(), &current);
        assert_eq!(added["A"], set(&["1"]));
    }

    #[test]
    fn load_missing_owner_is_empty() {
        let store = SnapshotStore::new(Arc::new(MemoryStore::new()));
        assert!(store.load("nobody").unwrap().is_empty());
    }

    #[test]
    fn group_key_format() {
        assert_eq!(group_key("b7", "sheet-2"), "b7||sheet-2");
    }
}
