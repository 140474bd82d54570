//! In-app notification log and external alert delivery.

pub mod log;
pub mod sink;

pub use log::{NotificationEntry, NotificationKind, NotificationLog};
pub use sink::{AlertChannel, NotificationSink};
