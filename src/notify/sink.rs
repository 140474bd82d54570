//! Notification sink: persist to the log, then best-effort external alert.
//!
//! The in-app log write always happens first and is the source of truth.
//! Forwarding to the external alert channel is best-effort: an unauthorized
//! or failing channel is logged and otherwise ignored.

use crate::error::Result;
use crate::notify::log::{NotificationEntry, NotificationLog};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// External alert channel contract. New channels only need to implement this trait.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Stable channel identifier (e.g. `telegram`, `email`).
    fn id(&self) -> &'static str;

    /// Whether the channel is currently permitted to deliver alerts.
    async fn is_authorized(&self) -> bool;

    /// Deliver one alert. Failures must not panic; the sink logs and continues.
    async fn send(&self, title: &str, body: &str) -> anyhow::Result<()>;
}

/// Sink every engine component emits through.
#[derive(Clone)]
pub struct NotificationSink {
    log: NotificationLog,
    alert: Option<Arc<dyn AlertChannel>>,
}

impl NotificationSink {
    /// Create a sink over the given log with no external channel.
    #[must_use]
    pub fn new(log: NotificationLog) -> Self {
        Self { log, alert: None }
    }

    /// Attach an external alert channel.
    #[must_use]
    pub fn with_alert_channel(mut self, channel: Arc<dyn AlertChannel>) -> Self {
        self.alert = Some(channel);
        self
    }

    /// Persist `entry` to the log, then forward it to the alert channel.
    ///
    /// The log write is the only fallible part; alert delivery problems are
    /// swallowed after a log line.
    pub async fn push(&self, entry: NotificationEntry) -> Result<()> {
        self.log.add(entry.clone())?;

        let Some(channel) = self.alert.as_ref() else {
            return Ok(());
        };

        if !channel.is_authorized().await {
            debug!(
                channel = channel.id(),
                "alert channel not authorized, keeping entry in-app only"
            );
            return Ok(());
        }

        if let Err(e) = channel.send(&entry.title, &entry.message).await {
            warn!(channel = channel.id(), "alert delivery failed: {e}");
        }
        Ok(())
    }

    /// The underlying log (list / unread / mark-read surface).
    #[must_use]
    pub fn log(&self) -> &NotificationLog {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::notify::log::NotificationKind;
    use crate::store::MemoryStore;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct RecordingChannel {
        authorized: AtomicBool,
        fail_sends: bool,
        sent: Mutex<Vec<String>>,
    }

    impl RecordingChannel {
        fn new(authorized: bool, fail_sends: bool) -> Self {
            Self {
                authorized: AtomicBool::new(authorized),
                fail_sends,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AlertChannel for RecordingChannel {
        fn id(&self) -> &'static str {
            "recording"
        }

        async fn is_authorized(&self) -> bool {
            self.authorized.load(Ordering::SeqCst)
        }

        async fn send(&self, title: &str, _body: &str) -> anyhow::Result<()> {
            if self.fail_sends {
                anyhow::bail!("channel down");
            }
            self.sent.lock().unwrap().push(title.to_owned());
            Ok(())
        }
    }

    fn sink_with(channel: Arc<RecordingChannel>) -> NotificationSink {
        let log = NotificationLog::new(Arc::new(MemoryStore::new()));
        NotificationSink::new(log).with_alert_channel(channel)
    }

    fn entry(title: &str) -> NotificationEntry {
        NotificationEntry::new(NotificationKind::Assignment, title, "body")
    }

    #[tokio::test]
    async fn push_logs_and_forwards_when_authorized() {
        let channel = Arc::new(RecordingChannel::new(true, false));
        let sink = sink_with(Arc::clone(&channel));

        sink.push(entry("hello")).await.unwrap();

        assert_eq!(sink.log().list().unwrap().len(), 1);
        assert_eq!(channel.sent.lock().unwrap().as_slice(), ["hello"]);
    }

    #[tokio::test]
    async fn unauthorized_channel_still_records_in_app() {
        let channel = Arc::new(RecordingChannel::new(false, false));
        let sink = sink_with(Arc::clone(&channel));

        sink.push(entry("quiet")).await.unwrap();

        assert_eq!(sink.log().list().unwrap().len(), 1);
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_failure_is_swallowed() {
        let channel = Arc::new(RecordingChannel::new(true, true));
        let sink = sink_with(channel);

        sink.push(entry("lossy")).await.unwrap();
        assert_eq!(sink.log().list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sink_without_channel_only_logs() {
        let log = NotificationLog::new(Arc::new(MemoryStore::new()));
        let sink = NotificationSink::new(log);
        sink.push(entry("solo")).await.unwrap();
        assert_eq!(sink.log().unread_count().unwrap(), 1);
    }
}
