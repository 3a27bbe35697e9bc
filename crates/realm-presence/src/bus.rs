//! Broadcast bus: fan-out of server events to open connections.
//!
//! Every open connection attaches one outbound queue. The bus never
//! touches a socket: it only pushes [`Outbound`] items, and the
//! connection's handler task writes them (or closes the socket).
//! Delivery is best-effort: a queue whose handler is gone is logged and
//! skipped, never allowed to fail the rest of a broadcast.

use std::collections::BTreeMap;
use std::fmt;

use realm_protocol::{Recipient, ServerEvent};
use realm_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::PresenceError;

/// Why the server is closing a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The same user authenticated on a newer connection.
    Superseded,
    /// No inbound activity for longer than the idle threshold.
    Idle,
    /// An operator tore down every session.
    MassDisconnect,
    /// The presence service is shutting down.
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Superseded => "superseded by a newer session",
            Self::Idle => "idle timeout",
            Self::MassDisconnect => "mass disconnect",
            Self::Shutdown => "server shutting down",
        };
        f.write_str(reason)
    }
}

/// An item queued for a connection's handler task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Write this event to the socket.
    Event(ServerEvent),
    /// Close the socket and stop. Always the last item a handler sees.
    Close(CloseReason),
}

/// Sending half of a connection's outbound queue.
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// Receiving half of a connection's outbound queue.
pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

/// Creates an outbound queue for one connection.
pub fn outbound_channel() -> (OutboundSender, OutboundReceiver) {
    mpsc::unbounded_channel()
}

/// Outbound queues of every open connection.
///
/// A `BTreeMap` so fan-out order is by connection id, which keeps logs
/// and tests deterministic.
#[derive(Debug, Default)]
pub struct BroadcastBus {
    sinks: BTreeMap<ConnectionId, OutboundSender>,
}

impl BroadcastBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a connection. Replaces any previous queue for the same id.
    pub fn attach(&mut self, connection_id: ConnectionId, sink: OutboundSender) {
        self.sinks.insert(connection_id, sink);
    }

    /// Detaches a connection without telling it anything.
    pub fn detach(&mut self, connection_id: ConnectionId) -> bool {
        self.sinks.remove(&connection_id).is_some()
    }

    pub fn is_attached(&self, connection_id: ConnectionId) -> bool {
        self.sinks.contains_key(&connection_id)
    }

    /// Queues one event for one connection.
    ///
    /// # Errors
    /// [`PresenceError::Delivery`] if the connection is not attached or its
    /// handler has already gone away.
    pub fn send_to(
        &self,
        connection_id: ConnectionId,
        event: ServerEvent,
    ) -> Result<(), PresenceError> {
        let sink = self
            .sinks
            .get(&connection_id)
            .ok_or(PresenceError::Delivery(connection_id))?;
        sink.send(Outbound::Event(event))
            .map_err(|_| PresenceError::Delivery(connection_id))
    }

    /// Delivers `event` to every connection matching `recipient`.
    ///
    /// Returns how many queues accepted it. Failures are logged per
    /// recipient and do not stop the loop.
    pub fn dispatch(&self, recipient: Recipient, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        for connection_id in self.sinks.keys().copied() {
            let wanted = match recipient {
                Recipient::All => true,
                Recipient::Connection(target) => connection_id == target,
                Recipient::AllExcept(excluded) => connection_id != excluded,
            };
            if !wanted {
                continue;
            }
            match self.send_to(connection_id, event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(%connection_id, error = %e, "broadcast delivery failed");
                }
            }
        }
        delivered
    }

    /// Shorthand for `dispatch(Recipient::All, ..)`.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        self.dispatch(Recipient::All, event)
    }

    /// Tells a connection to close and detaches it.
    ///
    /// Returns `false` if the connection was not attached. The close itself
    /// happens asynchronously in the handler; the bus does not wait for it.
    pub fn close(&mut self, connection_id: ConnectionId, reason: CloseReason) -> bool {
        let Some(sink) = self.sinks.remove(&connection_id) else {
            return false;
        };
        if sink.send(Outbound::Close(reason)).is_err() {
            tracing::debug!(%connection_id, %reason, "close request not delivered, handler already gone");
        }
        true
    }

    /// Attached connection ids in ascending order.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.sinks.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}
