//! External read contracts consumed by the engine.
//!
//! The dashboard backend, auth provider, and alert channel are collaborators;
//! the engine only sees the narrow traits here. [`crate::backend::HttpBackend`]
//! is the production [`BackendSource`]; tests script their own.

use crate::error::Result;
use crate::schedule::ScheduleConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated actor the engine runs on behalf of.
///
/// Supplied by the external auth collaborator; the engine treats identity as
/// opaque and only inspects the role for the administrator policy gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Stable principal identifier. Scopes all persisted engine state.
    pub id: String,
    /// Display name, used in log lines only.
    pub display_name: String,
    /// Role within the dashboard.
    pub role: PrincipalRole,
}

/// Dashboard role of a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalRole {
    /// Regular member: receives reminders and polling notifications.
    Member,
    /// Administrator: the engine is a complete no-op.
    Administrator,
}

impl Principal {
    /// Returns `true` for administrator principals.
    #[must_use]
    pub fn is_administrator(&self) -> bool {
        self.role == PrincipalRole::Administrator
    }
}

/// One currently assigned work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedItem {
    /// Item identifier, unique within its `(batch, sheet)` group.
    pub id: String,
    /// Batch the item belongs to.
    pub batch: String,
    /// Sheet within the batch.
    pub sheet: String,
}

/// One follow-up event from the backend feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpEvent {
    /// Owning principal id.
    pub owner_id: String,
    /// Batch of the lead.
    pub batch: String,
    /// Sheet of the lead.
    pub sheet: String,
    /// Lead identifier.
    pub lead_id: String,
    /// Follow-up sequence number for the lead (1st, 2nd, ...).
    pub sequence: u32,
    /// Due instant of this follow-up.
    pub due_date: DateTime<Utc>,
    /// Lead display name, carried into the notification message.
    pub display_name: String,
    /// Lead phone number, carried into the notification message.
    pub phone: String,
}

/// The follow-up feed: server time plus overdue and upcoming events.
///
/// Due-comparison always uses `server_now`, never the client clock, so
/// client clock skew cannot cause premature or missed firing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpFeed {
    /// Backend-reported current time.
    pub server_now: DateTime<Utc>,
    /// Events already past due as of `server_now`.
    pub overdue: Vec<FollowUpEvent>,
    /// Events coming due soon.
    pub upcoming: Vec<FollowUpEvent>,
}

/// The three read contracts against the dashboard backend.
///
/// Every method is an external fetch: callers bound it with a timeout and
/// treat failures as skip-this-cycle, never as fatal.
#[async_trait]
pub trait BackendSource: Send + Sync {
    /// Reminder slot definitions for the principal.
    async fn schedule_config(&self, principal: &Principal) -> Result<ScheduleConfig>;

    /// Current assignment snapshot for the principal.
    async fn assigned_items(&self, principal: &Principal) -> Result<Vec<AssignedItem>>;

    /// Overdue and upcoming follow-up events for the principal.
    async fn follow_up_events(&self, principal: &Principal) -> Result<FollowUpFeed>;
}
