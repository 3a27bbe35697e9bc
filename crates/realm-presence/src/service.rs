//! The presence service: every state transition, synchronously.
//!
//! `PresenceService` owns the registry, the activity tracker, the counter
//! and the broadcast bus. Each public method is one complete transition:
//! bookkeeping, counter update, broadcasts, activity record. Nothing here
//! awaits, so running the service inside a single actor task (see
//! [`spawn_presence`](crate::spawn_presence)) gives run-to-completion
//! semantics for free.
//!
//! ```text
//!   connect ──→ Unauthenticated ──authenticate(ok)──→ Authenticated
//!                   │     ↑ authenticate(err)              │  authenticate(other user) → auth_error
//!                   │     └─────────┘                      ├─ same user elsewhere ─→ Evicted ─┐
//!                   │                                      │                                  │
//!                   └────── idle / disconnect / mass ──────┴──────────────────────────────→ Closed
//! ```

use std::sync::Arc;

use realm_auth::{AuthError, Identity, TokenVerifier};
use realm_protocol::{
    ActivityFeedItem, ActivityItem, ChatDraft, ChatLine, MassDisconnectNotice,
    PresenceNotice, RawToken, ServerEvent, SystemMessageKind, SystemNotice,
};
use realm_reaper::ActivityTracker;
use realm_transport::ConnectionId;

use crate::{
    ActivityKind, ActivityLog, ActivityRecord, BroadcastBus, Clock,
    CloseReason, ConnectionRegistry, OutboundSender, PresenceConfig,
    PresenceCounter, PresenceError, SystemClock, TracingActivityLog,
};

/// What happened to an `authenticate` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The connection is now registered as `identity`. `evicted` is the
    /// user's previous connection, which has been closed.
    Accepted {
        identity: Identity,
        evicted: Option<ConnectionId>,
    },

    /// The token was rejected; the client got an `auth_error`.
    Rejected(AuthError),

    /// The connection is no longer open (already closed, reaped or
    /// evicted before its request was processed). Nothing was done.
    Stale,
}

pub struct PresenceService {
    config: PresenceConfig,
    verifier: Arc<dyn TokenVerifier>,
    clock: Arc<dyn Clock>,
    activity_log: Arc<dyn ActivityLog>,
    registry: ConnectionRegistry,
    activity: ActivityTracker<ConnectionId>,
    counter: PresenceCounter,
    bus: BroadcastBus,
}

impl PresenceService {
    /// Creates an empty service using the system clock and the tracing
    /// activity log.
    pub fn new(config: PresenceConfig, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            config,
            verifier,
            clock: Arc::new(SystemClock),
            activity_log: Arc::new(TracingActivityLog),
            registry: ConnectionRegistry::new(),
            activity: ActivityTracker::new(),
            counter: PresenceCounter::new(),
            bus: BroadcastBus::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_activity_log(mut self, activity_log: Arc<dyn ActivityLog>) -> Self {
        self.activity_log = activity_log;
        self
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    // =====================================================================
    // Connection lifecycle
    // =====================================================================

    /// A transport accepted a new connection.
    ///
    /// Starts idle tracking (unauthenticated connections are reaped too),
    /// attaches the outbound queue and sends the current player count.
    pub fn connect(&mut self, connection_id: ConnectionId, sink: OutboundSender) {
        self.activity.touch(connection_id, self.clock.now());
        self.bus.attach(connection_id, sink);
        let _ = self
            .bus
            .send_to(connection_id, ServerEvent::PlayersCount(self.counter.get()));
        tracing::debug!(%connection_id, connections = self.bus.len(), "connection opened");
    }

    /// Verifies `token` and registers the connection under its identity.
    ///
    /// On success any previous connection of the same user is closed and
    /// replaced; the counter only moves if the user was not online yet.
    /// On failure the client gets `auth_error` and may retry.
    pub fn authenticate(
        &mut self,
        connection_id: ConnectionId,
        token: &RawToken,
    ) -> AuthOutcome {
        if !self.activity.refresh(connection_id, self.clock.now()) {
            tracing::debug!(%connection_id, "authenticate from closed connection ignored");
            return AuthOutcome::Stale;
        }

        let verified = if token.is_malformed() {
            Err(AuthError::TokenMalformed)
        } else {
            self.verifier.verify(token)
        };

        // An identity is fixed for the lifetime of its connection.
        let verified = match (verified, self.registry.get(connection_id)) {
            (Ok(identity), Some(current)) if current.user_id != identity.user_id => {
                Err(AuthError::AlreadyAuthenticated)
            }
            (verified, _) => verified,
        };

        let identity = match verified {
            Ok(identity) => identity,
            Err(err) => {
                tracing::info!(%connection_id, error = %err, "authentication rejected");
                let _ = self.bus.send_to(
                    connection_id,
                    ServerEvent::AuthError {
                        message: err.to_string(),
                    },
                );
                return AuthOutcome::Rejected(err);
            }
        };

        // Re-authenticating as the same user keeps the registered identity.
        if let Some(current) = self.registry.get(connection_id).cloned() {
            let _ = self.bus.send_to(
                connection_id,
                ServerEvent::AuthSuccess {
                    username: current.username.clone(),
                },
            );
            return AuthOutcome::Accepted {
                identity: current,
                evicted: None,
            };
        }

        let evicted = self.registry.register(connection_id, identity.clone());
        let timestamp = self.clock.wall();

        let _ = self.bus.send_to(
            connection_id,
            ServerEvent::AuthSuccess {
                username: identity.username.clone(),
            },
        );

        match evicted {
            Some(old) => {
                // Same user, new connection: the count does not change.
                self.activity.remove(old);
                self.bus.close(old, CloseReason::Superseded);
                tracing::info!(
                    user_id = %identity.user_id,
                    evicted = %old,
                    %connection_id,
                    "session superseded"
                );
                self.record(
                    ActivityKind::Evicted,
                    format!("{} reconnected, previous session closed", identity.username),
                    Some(&identity),
                    Some(old),
                );
            }
            None => {
                self.counter.increment();
                tracing::info!(
                    user_id = %identity.user_id,
                    %connection_id,
                    online = self.counter.get(),
                    "player authenticated"
                );
                self.bus.broadcast(&ServerEvent::LoginNotification(PresenceNotice {
                    username: identity.username.clone(),
                    timestamp,
                }));
                self.record(
                    ActivityKind::Login,
                    format!("{} logged in", identity.username),
                    Some(&identity),
                    Some(connection_id),
                );
            }
        }

        self.broadcast_count();
        self.debug_check();

        AuthOutcome::Accepted { identity, evicted }
    }

    /// Refreshes last-seen for a connection. Returns `false` if the
    /// connection is no longer tracked.
    pub fn touch(&mut self, connection_id: ConnectionId) -> bool {
        self.activity.refresh(connection_id, self.clock.now())
    }

    /// Latency probe: refresh last-seen and echo the client's time.
    pub fn ping(&mut self, connection_id: ConnectionId, client_time: u64) {
        if self.touch(connection_id) {
            let _ = self.bus.send_to(connection_id, ServerEvent::Pong(client_time));
        }
    }

    /// A client shared a feed item. Only authenticated clients are heard.
    pub fn activity(&mut self, connection_id: ConnectionId, item: ActivityItem) {
        if !self.touch(connection_id) {
            return;
        }
        let Some(identity) = self.registry.get(connection_id).cloned() else {
            self.reject_unauthenticated(connection_id);
            return;
        };

        let timestamp = self.clock.wall();
        self.bus.broadcast(&ServerEvent::Activity(ActivityFeedItem {
            message: item.message.clone(),
            kind: item.kind.clone(),
            timestamp,
        }));
        self.record(
            ActivityKind::Feed(item.kind),
            item.message,
            Some(&identity),
            Some(connection_id),
        );
    }

    /// A client sent a chat line. Only authenticated clients are heard.
    pub fn chat(&mut self, connection_id: ConnectionId, draft: ChatDraft) {
        if !self.touch(connection_id) {
            return;
        }
        let Some(identity) = self.registry.get(connection_id) else {
            self.reject_unauthenticated(connection_id);
            return;
        };

        let line = ChatLine {
            username: identity.username.clone(),
            message: draft.message,
            timestamp: self.clock.wall(),
        };
        self.bus.broadcast(&ServerEvent::ChatMessage(line));
    }

    /// The connection is gone (client left, network dropped, handler
    /// ended). Idempotent: a second call for the same id does nothing.
    ///
    /// Returns the identity that was registered on it, if any.
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Identity> {
        self.bus.detach(connection_id);
        let identity = self.teardown(connection_id);
        tracing::debug!(%connection_id, connections = self.bus.len(), "connection closed");
        identity
    }

    // =====================================================================
    // Forced teardown
    // =====================================================================

    /// Closes every connection that has been idle for longer than the
    /// configured threshold. Returns the closed connection ids.
    pub fn sweep(&mut self) -> Vec<ConnectionId> {
        let idle = self
            .activity
            .idle(self.clock.now(), self.config.idle_threshold);

        for &connection_id in &idle {
            self.bus.close(connection_id, CloseReason::Idle);
            let identity = self.teardown(connection_id);
            let who = identity
                .as_ref()
                .map_or_else(|| connection_id.to_string(), |i| i.username.clone());
            tracing::info!(%connection_id, %who, "idle connection reaped");
            self.record(
                ActivityKind::IdleReaped,
                format!("{who} disconnected for inactivity"),
                identity.as_ref(),
                Some(connection_id),
            );
        }

        if !idle.is_empty() {
            self.debug_check();
        }
        idle
    }

    /// Closes every open connection and resets all presence state.
    ///
    /// Everyone first receives one `mass_disconnect` event and the final
    /// `players_count` of zero, then a close. Returns how many connections
    /// were closed.
    pub fn mass_disconnect(&mut self) -> usize {
        let timestamp = self.clock.wall();
        let previously_online = self.counter.get();

        self.registry.clear();
        self.activity.clear();
        self.counter.reset();

        self.bus.broadcast(&ServerEvent::MassDisconnect(MassDisconnectNotice {
            message: "All sessions have been disconnected by an administrator".into(),
            timestamp,
        }));
        self.broadcast_count();

        let closed = self.close_all(CloseReason::MassDisconnect);

        tracing::info!(closed, previously_online, "mass disconnect");
        self.record(
            ActivityKind::MassDisconnect,
            format!("administrator disconnected {closed} connections"),
            None,
            None,
        );
        self.debug_check();
        closed
    }

    /// Operator broadcast to every open connection.
    pub fn system_message(&mut self, message: String, kind: SystemMessageKind) -> usize {
        let delivered = self.bus.broadcast(&ServerEvent::SystemMessage(SystemNotice {
            message: message.clone(),
            kind,
        }));
        self.record(ActivityKind::System, message, None, None);
        delivered
    }

    /// Closes everything and clears all state without any broadcast.
    /// Returns how many connections were closed.
    pub fn shutdown(&mut self) -> usize {
        self.registry.clear();
        self.activity.clear();
        self.counter.reset();
        let closed = self.close_all(CloseReason::Shutdown);
        tracing::info!(closed, "presence service shut down");
        closed
    }

    // =====================================================================
    // Queries
    // =====================================================================

    pub fn players_count(&self) -> u64 {
        self.counter.get()
    }

    /// Identities online right now, sorted by user id.
    pub fn online_players(&self) -> Vec<Identity> {
        self.registry.identities()
    }

    pub fn identity_of(&self, connection_id: ConnectionId) -> Option<&Identity> {
        self.registry.get(connection_id)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn activity_tracker(&self) -> &ActivityTracker<ConnectionId> {
        &self.activity
    }

    /// Open connections, authenticated or not.
    pub fn connection_count(&self) -> usize {
        self.bus.len()
    }

    /// Checks `counter == |registry| == |distinct users|` and that the
    /// registry's user index agrees with its entries.
    pub fn check_invariants(&self) -> Result<(), PresenceError> {
        self.registry.check_consistency()?;
        let entries = self.registry.len() as u64;
        if self.counter.get() != entries {
            return Err(PresenceError::RegistryInvariantViolation(format!(
                "counter is {} but registry holds {entries} entries",
                self.counter.get()
            )));
        }
        Ok(())
    }

    // =====================================================================
    // Internals
    // =====================================================================

    /// Drops registry and activity bookkeeping for one connection.
    ///
    /// If an identity was registered, the counter goes down and everyone
    /// is told about the logout and the new count.
    fn teardown(&mut self, connection_id: ConnectionId) -> Option<Identity> {
        self.activity.remove(connection_id);
        let identity = self.registry.unregister(connection_id)?;
        self.counter.decrement();

        tracing::info!(
            user_id = %identity.user_id,
            %connection_id,
            online = self.counter.get(),
            "player logged out"
        );
        self.bus.broadcast(&ServerEvent::LogoutNotification(PresenceNotice {
            username: identity.username.clone(),
            timestamp: self.clock.wall(),
        }));
        self.record(
            ActivityKind::Logout,
            format!("{} logged out", identity.username),
            Some(&identity),
            Some(connection_id),
        );
        self.broadcast_count();
        self.debug_check();
        Some(identity)
    }

    fn close_all(&mut self, reason: CloseReason) -> usize {
        let ids = self.bus.connection_ids();
        for &connection_id in &ids {
            self.bus.close(connection_id, reason);
        }
        ids.len()
    }

    fn broadcast_count(&self) {
        self.bus.broadcast(&ServerEvent::PlayersCount(self.counter.get()));
    }

    fn reject_unauthenticated(&self, connection_id: ConnectionId) {
        let _ = self.bus.send_to(
            connection_id,
            ServerEvent::Error {
                message: "not authenticated".into(),
            },
        );
    }

    fn record(
        &self,
        kind: ActivityKind,
        message: String,
        identity: Option<&Identity>,
        connection_id: Option<ConnectionId>,
    ) {
        self.activity_log.record(ActivityRecord {
            kind,
            message,
            user_id: identity.map(|i| i.user_id),
            connection_id,
            timestamp: self.clock.wall(),
        });
    }

    fn debug_check(&self) {
        debug_assert!(
            self.check_invariants().is_ok(),
            "{:?}",
            self.check_invariants()
        );
    }
}

impl std::fmt::Debug for PresenceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceService")
            .field("config", &self.config)
            .field("online", &self.counter.get())
            .field("connections", &self.bus.len())
            .finish_non_exhaustive()
    }
}

// =========================================================================
// Tests
// =========================================================================
