//! Chime: reminder scheduling and change-detection notifications for the
//! lead dashboard.
//!
//! The engine fires time-of-day reminders in a fixed business timezone with
//! at-most-once delivery per local date (persisted dedup survives restarts),
//! and polls the dashboard backend for newly assigned items and due
//! follow-ups, alerting only on additions.
//!
//! # Architecture
//!
//! Independent components wired together by the [`engine::Engine`] controller:
//! - **Clock**: fixed-offset wall-clock conversions (`clock`)
//! - **Store**: injected persistent key/value state (`store`)
//! - **Scheduler**: per-day slot timers with grace-window catch-up (`scheduler`)
//! - **Poller**: interval change detection over two backend feeds (`poller`)
//! - **Sink**: bounded in-app log + best-effort external alerts (`notify`)

pub mod backend;
pub mod chime_dirs;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod notify;
pub mod poller;
pub mod schedule;
pub mod scheduler;
pub mod settings;
pub mod snapshot;
pub mod sources;
pub mod store;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{ChimeError, Result};
pub use notify::{AlertChannel, NotificationEntry, NotificationKind, NotificationLog};
pub use schedule::{ReminderSlot, ScheduleConfig};
pub use settings::{NotificationCategory, NotificationSettings};
pub use sources::{BackendSource, Principal, PrincipalRole};
pub use store::{JsonFileStore, MemoryStore, PersistentStore};
