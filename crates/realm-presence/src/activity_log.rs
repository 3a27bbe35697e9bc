//! Activity feed records.
//!
//! Lifecycle transitions worth showing to operators (logins, evictions,
//! idle reaps, mass disconnects) and client feed items are handed to an
//! [`ActivityLog`]. Persisting them is somebody else's job; the default
//! implementation writes them to the `realm::activity` tracing target.

use chrono::{DateTime, Utc};
use realm_auth::UserId;
use realm_transport::ConnectionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityKind {
    Login,
    Logout,
    Evicted,
    IdleReaped,
    MassDisconnect,
    System,
    /// Free-form item from a client; carries the client's `type` field.
    Feed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub kind: ActivityKind,
    pub message: String,
    pub user_id: Option<UserId>,
    pub connection_id: Option<ConnectionId>,
    pub timestamp: DateTime<Utc>,
}

/// Append-only sink for activity records.
///
/// Called from inside the presence event loop, so implementations must
/// not block: hand the record off (channel, buffered writer) and return.
pub trait ActivityLog: Send + Sync + 'static {
    fn record(&self, record: ActivityRecord);
}

/// Writes every record as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingActivityLog;

impl ActivityLog for TracingActivityLog {
    fn record(&self, record: ActivityRecord) {
        tracing::info!(
            target: "realm::activity",
            kind = ?record.kind,
            user_id = record.user_id.map(|u| u.0),
            connection_id = record.connection_id.map(|c| c.into_inner()),
            timestamp = %record.timestamp,
            "{}",
            record.message
        );
    }
}
