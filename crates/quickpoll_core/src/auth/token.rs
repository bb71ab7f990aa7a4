//! HS256-signed identity tokens.

use crate::constants::TOKEN_LIFETIME_HOURS;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token was issued to.
    pub sub: String,
    /// Issue time, seconds since the epoch.
    pub iat: i64,
    /// Expiry time, seconds since the epoch.
    pub exp: i64,
}

/// Token verification and signing failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token expired")]
    Expired,

    #[error("Token signing failed: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(err.to_string()),
        }
    }
}

/// Issues and verifies tokens with one server-held key.
///
/// Verification never consults the user store: a well-signed, unexpired token
/// is trusted on its own.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Build a service signing with `secret`.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            lifetime: Duration::hours(TOKEN_LIFETIME_HOURS),
        }
    }

    /// Override the token lifetime.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Lifetime applied to newly issued tokens.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a token for `user`, valid from now.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] when encoding fails.
    pub fn issue(&self, user: &str) -> Result<String, TokenError> {
        self.issue_at(user, Utc::now())
    }

    /// Issue a token for `user` as if it had been issued at `issued_at`.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] when encoding fails.
    pub fn issue_at(&self, user: &str, issued_at: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.lifetime).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    /// Verify `token` and return its claims.
    ///
    /// # Errors
    /// Returns [`TokenError::Expired`] past `exp` (no leeway) and
    /// [`TokenError::Invalid`] for anything malformed, tampered or signed with
    /// another key.
    pub fn claims(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        if data.claims.sub.is_empty() {
            return Err(TokenError::Invalid("missing subject".to_string()));
        }
        Ok(data.claims)
    }

    /// Verify `token` and return the username it was issued to.
    ///
    /// # Errors
    /// See [`TokenService::claims`].
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        self.claims(token).map(|claims| claims.sub)
    }
}
