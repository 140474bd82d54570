//! Change-detection poller.
//!
//! Runs on a fixed interval for as long as the engine is enabled. Each tick
//! performs two independent sub-polls, new assignment detection and
//! follow-up-due detection, with failures isolated per sub-poll: a backend
//! error in one never aborts the other, and neither ever stops the loop.

use crate::dedup::DedupLedger;
use crate::error::{ChimeError, Result};
use crate::notify::{NotificationEntry, NotificationKind, NotificationSink};
use crate::settings::{NotificationCategory, SettingsHandle};
use crate::snapshot::{self, GroupSnapshot, SnapshotStore};
use crate::sources::{BackendSource, FollowUpEvent, Principal};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fixed-interval poller over the two change-detection sub-polls.
pub struct Poller {
    source: Arc<dyn BackendSource>,
    snapshots: SnapshotStore,
    dedup: DedupLedger,
    sink: NotificationSink,
    settings: SettingsHandle,
    fetch_timeout: Duration,
    /// Serializes ticks with slot fires and reschedules for the principal.
    exec: Arc<Mutex<()>>,
}

impl Poller {
    /// Create a poller over the given collaborators.
    #[must_use]
    pub fn new(
        source: Arc<dyn BackendSource>,
        snapshots: SnapshotStore,
        dedup: DedupLedger,
        sink: NotificationSink,
        settings: SettingsHandle,
        fetch_timeout: Duration,
        exec: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            source,
            snapshots,
            dedup,
            sink,
            settings,
            fetch_timeout,
            exec,
        }
    }

    /// Start the poll loop. Runs until `cancel` is cancelled.
    pub fn spawn(
        self: Arc<Self>,
        principal: Principal,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(principal = %principal.id, interval_secs = interval.as_secs(), "poller started");
            let mut ticker = tokio::time::interval(interval);
            // The immediate first tick of `interval` doubles as the initial poll.
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!(principal = %principal.id, "poller stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        self.tick(&principal).await;
                    }
                }
            }
        })
    }

    /// One poll tick: both sub-polls, each isolated.
    pub async fn tick(&self, principal: &Principal) {
        let _exec = self.exec.lock().await;

        let settings = match self.settings.get() {
            Ok(settings) => settings,
            Err(e) => {
                warn!("cannot read settings, skipping poll tick: {e}");
                return;
            }
        };

        if settings.is_enabled(NotificationCategory::Assignments) {
            if let Err(e) = self.poll_assignments(principal).await {
                warn!(principal = %principal.id, "assignment poll failed: {e}");
            }
        }

        if settings.is_enabled(NotificationCategory::FollowUps) {
            if let Err(e) = self.poll_follow_ups(principal).await {
                warn!(principal = %principal.id, "follow-up poll failed: {e}");
            }
        }
    }

    /// Detect newly assigned items, one aggregated entry per `(batch, sheet)`
    /// group. The new snapshot is persisted only after the notifications for
    /// its additions were emitted (accepted at-least-once across a crash).
    async fn poll_assignments(&self, principal: &Principal) -> Result<usize> {
        let items = tokio::time::timeout(self.fetch_timeout, self.source.assigned_items(principal))
            .await
            .map_err(|_| ChimeError::FetchFailed("assignment fetch timed out".to_owned()))??;

        let mut current = GroupSnapshot::new();
        for item in items {
            current
                .entry(snapshot::group_key(&item.batch, &item.sheet))
                .or_default()
                .insert(item.id);
        }

        let previous = self.snapshots.load(&principal.id)?;
        let added = snapshot::diff_added(&previous, &current);

        let mut detected = 0usize;
        for (group, ids) in &added {
            detected += ids.len();
            let (batch, sheet) = group.split_once("||").unwrap_or((group.as_str(), ""));
            let entry = NotificationEntry::new(
                NotificationKind::Assignment,
                "New assignments",
                format!("{} item(s) added — {batch}/{sheet}", ids.len()),
            );
            if let Err(e) = self.sink.push(entry).await {
                warn!(group = %group, "cannot record assignment notification: {e}");
            }
        }

        self.snapshots.replace(&principal.id, &current)?;
        if detected > 0 {
            debug!(principal = %principal.id, detected, "new assignments detected");
        }
        Ok(detected)
    }

    /// Detect follow-ups whose due instant has passed, measured against the
    /// server-reported time, firing each natural key at most once.
    async fn poll_follow_ups(&self, principal: &Principal) -> Result<usize> {
        let feed =
            tokio::time::timeout(self.fetch_timeout, self.source.follow_up_events(principal))
                .await
                .map_err(|_| ChimeError::FetchFailed("follow-up fetch timed out".to_owned()))??;

        let mut fired = 0usize;
        for event in feed.overdue.iter().chain(feed.upcoming.iter()) {
            if event.due_date > feed.server_now {
                continue;
            }

            let key = DedupLedger::follow_up_key(event);
            if !self.dedup.record_once(&key)? {
                continue;
            }

            fired += 1;
            if let Err(e) = self.sink.push(due_entry(event)).await {
                warn!(lead = %event.lead_id, "cannot record follow-up notification: {e}");
            }
        }

        if fired > 0 {
            debug!(principal = %principal.id, fired, "follow-ups due");
        }
        Ok(fired)
    }
}

fn due_entry(event: &FollowUpEvent) -> NotificationEntry {
    NotificationEntry::new(
        NotificationKind::Warning,
        "Follow-up due",
        format!(
            "Follow-up #{} due for {} ({}) — {}/{}",
            event.sequence, event.display_name, event.phone, event.batch, event.sheet
        ),
    )
}
