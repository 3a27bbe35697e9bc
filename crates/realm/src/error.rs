//! Unified error type for the Realm server.

use realm_auth::AuthError;
use realm_presence::PresenceError;
use realm_protocol::ProtocolError;
use realm_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum RealmError {
    /// Socket-level failure (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Token verification or verifier construction failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The presence actor is gone.
    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// A configuration value could not be used.
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let realm_err: RealmError = err.into();
        assert!(matches!(realm_err, RealmError::Transport(_)));
        assert!(realm_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let bad = serde_json_error();
        let realm_err: RealmError = ProtocolError::Decode(bad).into();
        assert!(matches!(realm_err, RealmError::Protocol(_)));
    }

    #[test]
    fn test_from_auth_error() {
        let realm_err: RealmError = AuthError::WeakSecret { min: 32 }.into();
        assert!(matches!(realm_err, RealmError::Auth(_)));
        assert!(realm_err.to_string().contains("32"));
    }

    #[test]
    fn test_from_presence_error() {
        let realm_err: RealmError = PresenceError::Unavailable.into();
        assert!(matches!(realm_err, RealmError::Presence(_)));
    }

    fn serde_json_error() -> serde_json::Error {
        serde_json::from_str::<u64>("nope").unwrap_err()
    }
}
