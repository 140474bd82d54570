//! Engine controller: lifecycle, policy gate, and wiring.
//!
//! Owns the slot scheduler, the poller, and the midnight rollover loop.
//! `start` is idempotent, `stop` is safe to call when not running, and the
//! whole engine is a no-op for administrator principals.

use crate::clock::LocalClock;
use crate::config::EngineConfig;
use crate::dedup::DedupLedger;
use crate::error::{ChimeError, Result};
use crate::notify::{AlertChannel, NotificationLog, NotificationSink};
use crate::poller::Poller;
use crate::schedule::ScheduleConfig;
use crate::scheduler::SlotScheduler;
use crate::settings::SettingsHandle;
use crate::snapshot::SnapshotStore;
use crate::sources::{BackendSource, Principal};
use crate::store::PersistentStore;
use chrono::Utc;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A running engine instance for one principal.
struct RunningState {
    principal: Principal,
    cancel: CancellationToken,
    scheduler: Arc<SlotScheduler>,
    /// The schedule config currently armed; replaced by rollover/reschedule.
    active_config: Arc<Mutex<ScheduleConfig>>,
}

/// The reminder/notification engine.
pub struct Engine {
    config: EngineConfig,
    clock: LocalClock,
    store: Arc<dyn PersistentStore>,
    source: Arc<dyn BackendSource>,
    alert: Option<Arc<dyn AlertChannel>>,
    running: StdMutex<Option<RunningState>>,
}

impl Engine {
    /// Create an engine over the injected store and backend source.
    ///
    /// # Errors
    ///
    /// Returns a config error when the configured UTC offset is invalid.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn PersistentStore>,
        source: Arc<dyn BackendSource>,
    ) -> Result<Self> {
        let clock = LocalClock::new(config.clock.utc_offset_minutes)?;
        Ok(Self {
            config,
            clock,
            store,
            source,
            alert: None,
            running: StdMutex::new(None),
        })
    }

    /// Attach an external alert channel (forwarded to when enabled in config).
    #[must_use]
    pub fn with_alert_channel(mut self, channel: Arc<dyn AlertChannel>) -> Self {
        self.alert = Some(channel);
        self
    }

    /// The notification log surface (`list` / `unread_count` / `mark_all_read`).
    #[must_use]
    pub fn notifications(&self) -> NotificationLog {
        NotificationLog::new(Arc::clone(&self.store))
    }

    /// The settings surface (per-category enable/disable).
    #[must_use]
    pub fn settings(&self) -> SettingsHandle {
        SettingsHandle::new(Arc::clone(&self.store))
    }

    /// Returns `true` while the engine is running for some principal.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.lock().map(|r| r.is_some()).unwrap_or(false)
    }

    /// Start the engine for `principal`.
    ///
    /// Idempotent: calling while already running is a no-op. Administrator
    /// principals disable the engine entirely: nothing is armed, nothing is
    /// polled.
    pub fn start(&self, principal: Principal) -> Result<()> {
        let mut running = self
            .running
            .lock()
            .map_err(|_| ChimeError::Store("engine state lock poisoned".to_owned()))?;

        if running.is_some() {
            debug!("engine already running, start ignored");
            return Ok(());
        }

        if principal.is_administrator() {
            info!(principal = %principal.id, "administrator principal, engine disabled");
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let exec = Arc::new(Mutex::new(()));
        let sink = self.build_sink();
        let dedup = DedupLedger::new(Arc::clone(&self.store));
        let settings = SettingsHandle::new(Arc::clone(&self.store));

        let scheduler = Arc::new(SlotScheduler::new(
            self.clock,
            dedup.clone(),
            sink.clone(),
            settings.clone(),
            Arc::clone(&exec),
            cancel.clone(),
        ));
        let active_config = Arc::new(Mutex::new(ScheduleConfig::default()));

        self.spawn_schedule_loop(
            Arc::clone(&scheduler),
            Arc::clone(&active_config),
            principal.clone(),
            cancel.clone(),
        );

        let poller = Arc::new(Poller::new(
            Arc::clone(&self.source),
            SnapshotStore::new(Arc::clone(&self.store)),
            dedup,
            sink,
            settings,
            Duration::from_secs(self.config.poll.fetch_timeout_secs),
            exec,
        ));
        poller.spawn(
            principal.clone(),
            Duration::from_secs(self.config.poll.interval_secs),
            cancel.clone(),
        );

        info!(principal = %principal.id, "engine started");
        *running = Some(RunningState {
            principal,
            cancel,
            scheduler,
            active_config,
        });
        Ok(())
    }

    /// Stop the engine: cancels every armed timer and the poll loop at once.
    ///
    /// Safe to call when not running.
    pub fn stop(&self) {
        let state = match self.running.lock() {
            Ok(mut running) => running.take(),
            Err(_) => return,
        };
        match state {
            Some(state) => {
                state.cancel.cancel();
                info!(principal = %state.principal.id, "engine stopped");
            }
            None => debug!("engine not running, stop ignored"),
        }
    }

    /// Re-pull the schedule config and re-arm today's slots immediately,
    /// without waiting for the midnight rollover.
    ///
    /// A no-op when the engine is not running. A failed config fetch keeps
    /// the currently armed config.
    pub async fn reschedule(&self) -> Result<()> {
        let (scheduler, active_config, principal) = {
            let running = self
                .running
                .lock()
                .map_err(|_| ChimeError::Store("engine state lock poisoned".to_owned()))?;
            match running.as_ref() {
                None => {
                    debug!("engine not running, reschedule ignored");
                    return Ok(());
                }
                Some(state) => (
                    Arc::clone(&state.scheduler),
                    Arc::clone(&state.active_config),
                    state.principal.clone(),
                ),
            }
        };

        let timeout = Duration::from_secs(self.config.poll.fetch_timeout_secs);
        refresh_and_arm(
            &*self.source,
            &scheduler,
            &active_config,
            &principal,
            timeout,
        )
        .await;
        Ok(())
    }

    fn build_sink(&self) -> NotificationSink {
        let sink = NotificationSink::new(NotificationLog::new(Arc::clone(&self.store)));
        match (&self.alert, self.config.alerts.enabled) {
            (Some(channel), true) => sink.with_alert_channel(Arc::clone(channel)),
            _ => sink,
        }
    }

    /// Spawn the schedule supervisor: initial fetch + arm, then one rollover
    /// per local midnight (plus buffer), refetching the config each time.
    fn spawn_schedule_loop(
        &self,
        scheduler: Arc<SlotScheduler>,
        active_config: Arc<Mutex<ScheduleConfig>>,
        principal: Principal,
        cancel: CancellationToken,
    ) {
        let source = Arc::clone(&self.source);
        let clock = self.clock;
        let fetch_timeout = Duration::from_secs(self.config.poll.fetch_timeout_secs);
        let rollover_buffer = Duration::from_secs(self.config.poll.rollover_buffer_secs);

        tokio::spawn(async move {
            refresh_and_arm(&*source, &scheduler, &active_config, &principal, fetch_timeout).await;

            loop {
                let now = Utc::now();
                let rollover_at = clock.next_local_midnight(now);
                let delay = (rollover_at - now)
                    .to_std()
                    .unwrap_or(Duration::ZERO)
                    .saturating_add(rollover_buffer);

                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!(principal = %principal.id, "schedule loop stopped");
                        return;
                    }
                    () = tokio::time::sleep(delay) => {
                        debug!(principal = %principal.id, "day rollover, rescheduling");
                        refresh_and_arm(&*source, &scheduler, &active_config, &principal, fetch_timeout)
                            .await;
                    }
                }
            }
        });
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Fetch the schedule config and re-arm. A failed fetch keeps the previously
/// armed config rather than disabling scheduling.
async fn refresh_and_arm(
    source: &dyn BackendSource,
    scheduler: &Arc<SlotScheduler>,
    active_config: &Arc<Mutex<ScheduleConfig>>,
    principal: &Principal,
    fetch_timeout: Duration,
) {
    let fetched = match tokio::time::timeout(fetch_timeout, source.schedule_config(principal)).await
    {
        Ok(Ok(config)) => Some(config),
        Ok(Err(e)) => {
            warn!(principal = %principal.id, "schedule config fetch failed, keeping previous: {e}");
            None
        }
        Err(_) => {
            warn!(principal = %principal.id, "schedule config fetch timed out, keeping previous");
            None
        }
    };

    let config = {
        let mut active = active_config.lock().await;
        if let Some(fetched) = fetched {
            if let Err(e) = fetched.validate() {
                warn!(principal = %principal.id, "schedule config invalid: {e}");
            }
            *active = fetched;
        }
        active.clone()
    };

    scheduler.reschedule(&config, Utc::now()).await;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::error::Result as ChimeResult;
    use crate::schedule::ReminderSlot;
    use crate::sources::{AssignedItem, FollowUpFeed, PrincipalRole};
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    struct EmptySource;

    #[async_trait]
    impl BackendSource for EmptySource {
        async fn schedule_config(&self, _principal: &Principal) -> ChimeResult<ScheduleConfig> {
            Ok(ScheduleConfig {
                slots: vec![ReminderSlot {
                    key: "am".to_owned(),
                    time: "09:00".to_owned(),
                    label: "Morning".to_owned(),
                }],
                grace_minutes: 20,
            })
        }

        async fn assigned_items(&self, _principal: &Principal) -> ChimeResult<Vec<AssignedItem>> {
            Ok(Vec::new())
        }

        async fn follow_up_events(&self, _principal: &Principal) -> ChimeResult<FollowUpFeed> {
            Ok(FollowUpFeed {
                server_now: Utc::now(),
                overdue: Vec::new(),
                upcoming: Vec::new(),
            })
        }
    }

    fn engine() -> Engine {
        Engine::new(
            EngineConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(EmptySource),
        )
        .unwrap()
    }

    fn member() -> Principal {
        Principal {
            id: "m1".to_owned(),
            display_name: "Member".to_owned(),
            role: PrincipalRole::Member,
        }
    }

    fn admin() -> Principal {
        Principal {
            id: "a1".to_owned(),
            display_name: "Admin".to_owned(),
            role: PrincipalRole::Administrator,
        }
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let engine = engine();
        engine.start(member()).unwrap();
        assert!(engine.is_running());
        engine.start(member()).unwrap();
        assert!(engine.is_running());
        engine.stop();
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn administrator_principal_disables_the_engine() {
        let engine = engine();
        engine.start(admin()).unwrap();
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn stop_when_not_running_is_a_no_op() {
        let engine = engine();
        engine.stop();
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn reschedule_when_not_running_is_a_no_op() {
        let engine = engine();
        engine.reschedule().await.unwrap();
        assert!(!engine.is_running());
    }
}
