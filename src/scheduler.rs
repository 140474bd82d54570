//! Daily reminder slot scheduler.
//!
//! Arms one timer per configured slot for the current local date, fires each
//! at most once per day through the dedup ledger, and replaces the whole
//! timer generation on every reschedule. A slot whose window has fully
//! elapsed (past the grace window) is skipped for the day; a slot inside the
//! grace window fires immediately (catch-up). The midnight rollover itself
//! is driven by the engine, which calls [`SlotScheduler::reschedule`] with a
//! freshly fetched config.

use crate::clock::LocalClock;
use crate::dedup::DedupLedger;
use crate::notify::{NotificationEntry, NotificationKind, NotificationSink};
use crate::schedule::{ReminderSlot, ScheduleConfig};
use crate::settings::{NotificationCategory, SettingsHandle};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Arming decision for one slot at reschedule time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArmDecision {
    /// Arm a timer with the given delay (zero = fire immediately).
    Arm(Duration),
    /// The slot's window has fully elapsed; skip it for today.
    Skip,
}

/// Decide whether a slot is armed, given its fire instant and the grace window.
fn arm_decision(now: DateTime<Utc>, fire_at: DateTime<Utc>, grace: ChronoDuration) -> ArmDecision {
    if fire_at > now {
        let delay = (fire_at - now).to_std().unwrap_or(Duration::ZERO);
        return ArmDecision::Arm(delay);
    }
    if now - fire_at > grace {
        return ArmDecision::Skip;
    }
    ArmDecision::Arm(Duration::ZERO)
}

/// Per-day slot timer owner.
pub struct SlotScheduler {
    clock: LocalClock,
    dedup: DedupLedger,
    sink: NotificationSink,
    settings: SettingsHandle,
    /// Serializes fires, poll ticks, and reschedules for the principal.
    exec: Arc<Mutex<()>>,
    /// Parent of every timer generation; cancelled on engine stop.
    root: CancellationToken,
    /// The active timer generation. Replaced wholesale on reschedule.
    generation: Mutex<CancellationToken>,
}

impl SlotScheduler {
    /// Create a scheduler whose timers are children of `root`.
    #[must_use]
    pub fn new(
        clock: LocalClock,
        dedup: DedupLedger,
        sink: NotificationSink,
        settings: SettingsHandle,
        exec: Arc<Mutex<()>>,
        root: CancellationToken,
    ) -> Self {
        let generation = Mutex::new(root.child_token());
        Self {
            clock,
            dedup,
            sink,
            settings,
            exec,
            root,
            generation,
        }
    }

    /// Cancel the current day's timers and arm `config`'s slots for the local
    /// date at `now`. Returns the number of slots armed.
    ///
    /// Malformed slots are skipped with a warning; they never abort the rest.
    /// An empty slot list arms nothing and is logged so misconfiguration is
    /// diagnosable.
    pub async fn reschedule(self: &Arc<Self>, config: &ScheduleConfig, now: DateTime<Utc>) -> usize {
        let _exec = self.exec.lock().await;

        let mut generation = self.generation.lock().await;
        generation.cancel();
        *generation = self.root.child_token();
        let cancel = generation.clone();
        drop(generation);

        let date = self.clock.local_date_of(now);
        if config.slots.is_empty() {
            warn!(%date, "schedule config has no slots, arming nothing");
            return 0;
        }

        let grace = ChronoDuration::minutes(i64::from(config.grace_minutes));
        let mut armed = 0usize;

        for slot in &config.slots {
            let fire_at = match slot.fire_instant(&self.clock, date) {
                Ok(instant) => instant,
                Err(e) => {
                    warn!(slot = %slot.key, "skipping malformed slot: {e}");
                    continue;
                }
            };

            match arm_decision(now, fire_at, grace) {
                ArmDecision::Skip => {
                    debug!(slot = %slot.key, %date, "slot window elapsed, skipped for today");
                }
                ArmDecision::Arm(delay) => {
                    armed += 1;
                    let scheduler = Arc::clone(self);
                    let slot = slot.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            () = cancel.cancelled() => {}
                            () = tokio::time::sleep(delay) => {
                                scheduler.fire_slot(date, &slot).await;
                            }
                        }
                    });
                }
            }
        }

        info!(%date, armed, "reminder slots armed");
        armed
    }

    /// Cancel all armed timers without arming replacements.
    pub async fn cancel_all(&self) {
        let mut generation = self.generation.lock().await;
        generation.cancel();
        *generation = self.root.child_token();
    }

    /// Fire path for one slot: dedup check, emit, record.
    ///
    /// Public within the crate so the poller-less engine tests can drive it
    /// directly; production fires arrive from the armed timers.
    pub(crate) async fn fire_slot(&self, date: NaiveDate, slot: &ReminderSlot) {
        let _exec = self.exec.lock().await;

        match self.settings.is_enabled(NotificationCategory::Reminders) {
            Ok(true) => {}
            Ok(false) => {
                debug!(slot = %slot.key, "reminders disabled, suppressing fire");
                return;
            }
            Err(e) => {
                warn!(slot = %slot.key, "cannot read settings, suppressing fire: {e}");
                return;
            }
        }

        let key = DedupLedger::slot_key(date, &slot.key);
        match self.dedup.record_once(&key) {
            Ok(true) => {}
            Ok(false) => {
                debug!(slot = %slot.key, %date, "reminder already fired today, suppressed");
                return;
            }
            Err(e) => {
                warn!(slot = %slot.key, "dedup check failed, suppressing fire: {e}");
                return;
            }
        }

        let entry = NotificationEntry::new(
            NotificationKind::Reminder,
            slot.label.clone(),
            format!("Daily reminder ({})", slot.time),
        );
        if let Err(e) = self.sink.push(entry).await {
            // The dedup record is already set; a lost entry here is not
            // retried. Matches the at-most-once contract for reminders.
            warn!(slot = %slot.key, "cannot record reminder: {e}");
        }
    }
}

impl std::fmt::Debug for SlotScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotScheduler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::notify::NotificationLog;
    use crate::store::{MemoryStore, PersistentStore};
    use chrono::TimeZone;

    fn minutes(m: i64) -> ChronoDuration {
        ChronoDuration::minutes(m)
    }

    #[test]
    fn future_slot_is_armed_with_its_delay() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
        let fire = now + minutes(30);
        assert_eq!(
            arm_decision(now, fire, minutes(20)),
            ArmDecision::Arm(Duration::from_secs(30 * 60))
        );
    }

    #[test]
    fn slot_within_grace_fires_immediately() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 9, 5, 0).unwrap();
        let fire = now - minutes(5);
        assert_eq!(
            arm_decision(now, fire, minutes(20)),
            ArmDecision::Arm(Duration::ZERO)
        );
    }

    #[test]
    fn slot_beyond_grace_is_skipped() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap();
        let fire = now - minutes(30);
        assert_eq!(arm_decision(now, fire, minutes(20)), ArmDecision::Skip);
    }

    #[test]
    fn grace_boundary_still_fires() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 9, 20, 0).unwrap();
        let fire = now - minutes(20);
        assert_eq!(
            arm_decision(now, fire, minutes(20)),
            ArmDecision::Arm(Duration::ZERO)
        );
    }

    fn scheduler_over(store: Arc<dyn PersistentStore>) -> Arc<SlotScheduler> {
        let clock = LocalClock::new(0).unwrap();
        let dedup = DedupLedger::new(Arc::clone(&store));
        let sink = NotificationSink::new(NotificationLog::new(Arc::clone(&store)));
        let settings = SettingsHandle::new(store);
        Arc::new(SlotScheduler::new(
            clock,
            dedup,
            sink,
            settings,
            Arc::new(Mutex::new(())),
            CancellationToken::new(),
        ))
    }

    fn slot(key: &str, time: &str) -> ReminderSlot {
        ReminderSlot {
            key: key.to_owned(),
            time: time.to_owned(),
            label: format!("{key} reminder"),
        }
    }

    #[tokio::test]
    async fn fire_slot_is_at_most_once_per_date() {
        let store: Arc<dyn PersistentStore> = Arc::new(MemoryStore::new());
        let scheduler = scheduler_over(Arc::clone(&store));
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let slot = slot("am", "09:00");

        scheduler.fire_slot(date, &slot).await;
        scheduler.fire_slot(date, &slot).await;

        let log = NotificationLog::new(store);
        assert_eq!(log.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disabled_reminders_suppress_fires_without_consuming_dedup() {
        let store: Arc<dyn PersistentStore> = Arc::new(MemoryStore::new());
        let scheduler = scheduler_over(Arc::clone(&store));
        let settings = SettingsHandle::new(Arc::clone(&store));
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let slot = slot("am", "09:00");

        settings.set(NotificationCategory::Reminders, false).unwrap();
        scheduler.fire_slot(date, &slot).await;

        let log = NotificationLog::new(Arc::clone(&store));
        assert_eq!(log.list().unwrap().len(), 0);

        // Re-enabling lets the slot fire; the suppressed attempt did not
        // burn the daily dedup record.
        settings.set(NotificationCategory::Reminders, true).unwrap();
        scheduler.fire_slot(date, &slot).await;
        assert_eq!(log.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reschedule_skips_malformed_slots_and_arms_the_rest() {
        let store: Arc<dyn PersistentStore> = Arc::new(MemoryStore::new());
        let scheduler = scheduler_over(store);
        let now = Utc::now();

        let config = ScheduleConfig {
            slots: vec![slot("bad", "25:99"), slot("ok", "23:59"), slot("ok2", "00:00")],
            grace_minutes: 2,
        };
        let armed = scheduler.reschedule(&config, now).await;
        // "bad" never arms; of the remaining two, at least one is armable at
        // any time of day (23:59 is in the future or inside grace except
        // right around midnight, when 00:00 is inside grace instead).
        assert!(armed >= 1 && armed <= 2, "armed = {armed}");
    }

    #[tokio::test]
    async fn reschedule_with_empty_config_arms_nothing() {
        let store: Arc<dyn PersistentStore> = Arc::new(MemoryStore::new());
        let scheduler = scheduler_over(store);
        let armed = scheduler.reschedule(&ScheduleConfig::default(), Utc::now()).await;
        assert_eq!(armed, 0);
    }

    #[tokio::test]
    async fn catch_up_slot_fires_once_through_the_armed_timer() {
        let store: Arc<dyn PersistentStore> = Arc::new(MemoryStore::new());
        let scheduler = scheduler_over(Arc::clone(&store));
        let clock = LocalClock::new(0).unwrap();

        // A slot five minutes in the past with a 20-minute grace window:
        // armed with zero delay, fires immediately.
        let now = Utc::now();
        let five_ago = now - minutes(5);
        let time = five_ago.format("%H:%M").to_string();
        // Guard against the rare UTC-midnight wraparound where "five minutes
        // ago" lands on the previous date.
        if clock.local_date_of(five_ago) != clock.local_date_of(now) {
            return;
        }

        let config = ScheduleConfig {
            slots: vec![slot("catchup", &time)],
            grace_minutes: 20,
        };
        let armed = scheduler.reschedule(&config, now).await;
        assert_eq!(armed, 1);

        // Rescheduling again re-arms the same slot; dedup keeps it to one fire.
        scheduler.reschedule(&config, now).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        let log = NotificationLog::new(store);
        assert_eq!(log.list().unwrap().len(), 1);
        assert_eq!(log.list().unwrap()[0].title, "catchup reminder");
    }
}
