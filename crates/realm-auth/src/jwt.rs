//! HS256 JSON Web Token verification.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use realm_protocol::RawToken;
use serde::{Deserialize, Serialize};

use crate::{AuthError, Identity, Role, TokenVerifier, UserId};

/// Shortest HMAC secret [`JwtVerifier::new`] accepts.
pub const MIN_SECRET_LEN: usize = 32;

/// Claims the account service puts in an identity token.
///
/// Public so that issuers (and tests) share the exact shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "id", alias = "userId")]
    pub user_id: u64,
    pub username: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims {
    fn into_identity(self) -> Result<Identity, AuthError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(AuthError::TokenMalformed);
        }
        Ok(Identity::new(UserId(self.user_id), username, self.role))
    }
}

/// Verifies HS256-signed identity tokens against a fixed secret.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Creates a verifier for tokens signed with `secret`.
    ///
    /// # Errors
    /// [`AuthError::WeakSecret`] if `secret` is shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn new(secret: &str) -> Result<Self, AuthError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::WeakSecret {
                min: MIN_SECRET_LEN,
            });
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &RawToken) -> Result<Identity, AuthError> {
        if token.is_malformed() {
            return Err(AuthError::TokenMalformed);
        }
        if token.is_empty() {
            return Err(AuthError::TokenMissing);
        }

        let claims = decode::<TokenClaims>(
            token.as_str(),
            &self.decoding_key,
            &self.validation,
        )
        .map_err(|e| {
            let err = classify(e.kind());
            tracing::debug!(error = %e, ?err, "token rejected");
            err
        })?
        .claims;

        claims.into_identity()
    }
}

/// Maps a `jsonwebtoken` failure onto our taxonomy.
fn classify(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
            AuthError::TokenInvalidSignature
        }
        _ => AuthError::TokenMalformed,
    }
}
