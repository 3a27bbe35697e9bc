//! Identity token verification for Realm.
//!
//! The HTTP layer issues signed identity tokens at login. This crate only
//! *consumes* them: a socket client submits its token in an
//! `authenticate` event and a [`TokenVerifier`] turns it into an
//! [`Identity`], or explains why it can't.
//!
//! Verification is pure and synchronous (CPU-bound signature checking
//! against a secret fixed at process start), so it can run inside the
//! presence event loop without introducing a suspension point.

mod error;
mod identity;
mod jwt;

pub use error::AuthError;
pub use identity::{Identity, Role, UserId};
pub use jwt::{JwtVerifier, MIN_SECRET_LEN, TokenClaims};

use realm_protocol::RawToken;

/// Validates a client's identity token and returns who they are.
///
/// Implement this to plug in a different token format. Tests use small
/// hand-written verifiers; production uses [`JwtVerifier`].
///
/// # Example
///
/// ```rust
/// use realm_auth::{AuthError, Identity, Role, TokenVerifier, UserId};
/// use realm_protocol::RawToken;
///
/// /// Treats the token as `<id>:<name>`. Development only.
/// struct DevVerifier;
///
/// impl TokenVerifier for DevVerifier {
///     fn verify(&self, token: &RawToken) -> Result<Identity, AuthError> {
///         if token.is_empty() {
///             return Err(AuthError::TokenMissing);
///         }
///         let (id, name) =
///             token.as_str().split_once(':').ok_or(AuthError::TokenMalformed)?;
///         let id: u64 = id.parse().map_err(|_| AuthError::TokenMalformed)?;
///         Ok(Identity::new(UserId(id), name, Role::User))
///     }
/// }
/// ```
pub trait TokenVerifier: Send + Sync + 'static {
    /// Checks, in order: presence, structure and signature, expiry.
    ///
    /// # Errors
    /// - [`AuthError::TokenMissing`]: nothing was submitted
    /// - [`AuthError::TokenMalformed`]: not a token, or unusable claims
    /// - [`AuthError::TokenInvalidSignature`]: signed with another key
    /// - [`AuthError::TokenExpired`]: past its `exp`
    fn verify(&self, token: &RawToken) -> Result<Identity, AuthError>;
}
