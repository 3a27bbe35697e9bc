//! Error types for token verification.

/// Why a token was not accepted.
///
/// Every token variant is recoverable: the client is told through an
/// `auth_error` event and may retry on the same connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No token was submitted, or it was empty.
    #[error("authentication token missing")]
    TokenMissing,

    /// The token could not be parsed, or its claims don't describe a
    /// usable identity (unknown role, empty username, ...).
    #[error("authentication token malformed")]
    TokenMalformed,

    /// The token parsed but was not signed with our key.
    #[error("authentication token signature invalid")]
    TokenInvalidSignature,

    /// The token is genuine but its `exp` has passed.
    #[error("authentication token expired")]
    TokenExpired,

    /// The token is valid but names a different user than the one the
    /// connection is already authenticated as.
    #[error("connection already authenticated as another user")]
    AlreadyAuthenticated,

    /// The verifier was configured with a secret too short to be safe.
    #[error("token secret must be at least {min} bytes long")]
    WeakSecret { min: usize },
}
