//! Fire-once dedup ledger.
//!
//! A persisted flag per notification key: daily reminder slots are keyed by
//! `(local date, slot key)`, follow-up-due events by their natural key.
//! Records are only ever created, never cleared; cleanup, if any, is an
//! external concern.

use crate::error::Result;
use crate::sources::FollowUpEvent;
use crate::store::{PersistentStore, keys};
use chrono::NaiveDate;
use std::sync::Arc;

/// Persisted check-and-set ledger over the principal's store.
#[derive(Clone)]
pub struct DedupLedger {
    store: Arc<dyn PersistentStore>,
}

impl DedupLedger {
    /// Create a ledger over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    /// Record `key` once. Returns `true` when newly recorded, `false` when
    /// the key had already fired.
    pub fn record_once(&self, key: &str) -> Result<bool> {
        if self.store.contains(key)? {
            return Ok(false);
        }
        self.store.put(key, serde_json::Value::Bool(true))?;
        Ok(true)
    }

    /// Returns `true` when `key` has already fired.
    pub fn has_fired(&self, key: &str) -> Result<bool> {
        self.store.contains(key)
    }

    /// Dedup key for a reminder slot on a local date.
    #[must_use]
    pub fn slot_key(date: NaiveDate, slot_key: &str) -> String {
        keys::slot_fired(date, slot_key)
    }

    /// Dedup key for a follow-up-due event (its natural key).
    #[must_use]
    pub fn follow_up_key(event: &FollowUpEvent) -> String {
        keys::follow_up_fired(
            &event.owner_id,
            &event.batch,
            &event.sheet,
            &event.lead_id,
            event.sequence,
            event.due_date.timestamp(),
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn ledger() -> DedupLedger {
        DedupLedger::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn record_once_fires_exactly_once() {
        let ledger = ledger();
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let key = DedupLedger::slot_key(date, "am");

        assert!(ledger.record_once(&key).unwrap());
        assert!(!ledger.record_once(&key).unwrap());
        assert!(ledger.has_fired(&key).unwrap());
    }

    #[test]
    fn same_slot_different_dates_are_independent() {
        let ledger = ledger();
        let d1 = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();

        assert!(ledger.record_once(&DedupLedger::slot_key(d1, "am")).unwrap());
        assert!(ledger.record_once(&DedupLedger::slot_key(d2, "am")).unwrap());
    }

    #[test]
    fn follow_up_key_distinguishes_sequences() {
        let due = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();
        let mut event = FollowUpEvent {
            owner_id: "u1".to_owned(),
            batch: "b1".to_owned(),
            sheet: "s1".to_owned(),
            lead_id: "lead-1".to_owned(),
            sequence: 1,
            due_date: due,
            display_name: "Asha".to_owned(),
            phone: "555-0101".to_owned(),
        };
        let first = DedupLedger::follow_up_key(&event);
        event.sequence = 2;
        let second = DedupLedger::follow_up_key(&event);
        assert_ne!(first, second);
    }
}
