//! Real-time presence for Realm.
//!
//! This crate owns the answer to "who is online right now":
//!
//! 1. **Connection Registry**: authenticated identity per connection, at
//!    most one connection per user ([`ConnectionRegistry`])
//! 2. **Presence Counter**: number of distinct users online
//!    ([`PresenceCounter`])
//! 3. **Broadcast Bus**: best-effort fan-out of events to every open
//!    connection ([`BroadcastBus`])
//! 4. **Idle reaping** and **mass disconnect**: forced teardown paths
//!    that flow through the same cleanup as a voluntary disconnect
//!
//! [`PresenceService`] ties them together as a synchronous state machine.
//! [`spawn_presence`] runs it as a single actor task so every transition
//! runs to completion before the next one starts; the rest of the server
//! talks to it through a cloneable [`PresenceHandle`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)     ← one handler task per socket, forwards events here
//!     ↕
//! Presence (this crate)  ← registry, counter, bus, reaper, admin ops
//!     ↕
//! Auth / Reaper / Protocol (below)  ← Identity, ActivityTracker, events
//! ```

mod activity_log;
mod actor;
mod bus;
mod clock;
mod config;
mod counter;
mod error;
mod registry;
mod service;

pub use activity_log::{ActivityKind, ActivityLog, ActivityRecord, TracingActivityLog};
pub use actor::{PresenceHandle, spawn_presence};
pub use bus::{BroadcastBus, CloseReason, Outbound, OutboundReceiver, OutboundSender, outbound_channel};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PresenceConfig;
pub use counter::PresenceCounter;
pub use error::PresenceError;
pub use registry::ConnectionRegistry;
pub use service::{AuthOutcome, PresenceService};
