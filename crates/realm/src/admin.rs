//! Administrative trigger.
//!
//! The HTTP route (`POST /api/admin/disconnect-all`) and the check that
//! its caller is an administrator live in the account service. This is
//! what that route calls.

use chrono::{DateTime, Utc};
use realm_auth::Identity;
use realm_presence::PresenceHandle;
use realm_protocol::SystemMessageKind;
use serde::Serialize;

use crate::RealmError;

/// Response body for a disconnect-all request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisconnectAllReport {
    /// Connections that were forcibly closed.
    pub disconnected: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AdminTrigger {
    presence: PresenceHandle,
}

impl AdminTrigger {
    pub fn new(presence: PresenceHandle) -> Self {
        Self { presence }
    }

    /// Closes every connection and resets presence to zero.
    pub async fn disconnect_all(&self) -> Result<DisconnectAllReport, RealmError> {
        let disconnected = self.presence.mass_disconnect().await?;
        tracing::warn!(disconnected, "admin disconnect-all");
        Ok(DisconnectAllReport {
            disconnected,
            timestamp: Utc::now(),
        })
    }

    /// Sends a system message to every open connection.
    pub async fn broadcast(
        &self,
        message: impl Into<String>,
        kind: SystemMessageKind,
    ) -> Result<usize, RealmError> {
        Ok(self.presence.system_message(message, kind).await?)
    }

    pub async fn players_count(&self) -> Result<u64, RealmError> {
        Ok(self.presence.players_count().await?)
    }

    pub async fn online_players(&self) -> Result<Vec<Identity>, RealmError> {
        Ok(self.presence.online_players().await?)
    }
}
