//! Error types for the presence layer.

use realm_transport::ConnectionId;

/// Errors surfaced by the presence layer.
///
/// Authentication failures are not here: they are an expected outcome
/// reported to the client, see [`AuthOutcome`](crate::AuthOutcome).
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// The presence actor has stopped (shutdown, or its task ended).
    #[error("presence service is unavailable")]
    Unavailable,

    /// An event could not be queued for one connection because its
    /// handler has already gone away. Swallowed by broadcasts.
    #[error("delivery to {0} failed")]
    Delivery(ConnectionId),

    /// Registry, index and counter disagree. Only ever produced by
    /// [`PresenceService::check_invariants`](crate::PresenceService::check_invariants);
    /// seeing it means there is a bug.
    #[error("registry invariant violated: {0}")]
    RegistryInvariantViolation(String),
}
