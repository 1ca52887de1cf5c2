//! Token issuance and verification.
//!
//! Access and refresh tokens are HS256 JWTs signed by the active key of a
//! [`KeyRing`](super::keys::KeyRing). The signing key's fingerprint rides in
//! the token header, so verification can pick the right key during a secret
//! rotation and reject tokens from keys we never held.
//!
//! Three properties are deliberate and load-bearing:
//!
//! - Expiry is exact. Validation runs with zero leeway, so a token is dead
//!   the second its `exp` passes.
//! - Refresh tokens are single-use. Presenting one mints a new pair and
//!   revokes the presented token by its `jti`; presenting it again fails.
//! - Access token verification never consults the revocation list. Access
//!   tokens are short-lived by construction and checked only cryptographically.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::keys::KeyRing;
use super::revocation::RevocationList;
use crate::models::user::{Role, User};

/// Issuer claim stamped into every token.
pub const ISSUER: &str = "portcullis";

/// Distinguishes short-lived access tokens from long-lived refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by every token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    /// Unique token id; the unit of revocation.
    pub jti: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
    pub token_type: TokenType,
}

impl Claims {
    /// Build claims expiring `ttl` from now. A negative `ttl` produces an
    /// already-expired token, which the tests lean on.
    pub fn new(user_id: Uuid, tenant_id: Uuid, role: Role, token_type: TokenType, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4(),
            tenant_id,
            role,
            token_type,
        }
    }
}

/// The pair returned by login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Errors from token operations.
///
/// The distinctions matter internally (logging, tests); the HTTP layer
/// collapses all verification failures into one uniform rejection so the
/// response cannot be used as an oracle.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to create token: {0}")]
    Create(String),
    #[error("token has expired")]
    Expired,
    #[error("token rejected: {0}")]
    Invalid(String),
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token has been revoked")]
    Revoked,
    #[error("expected {expected} token, got {actual}")]
    WrongType {
        expected: TokenType,
        actual: TokenType,
    },
}

/// Issues, verifies, rotates, and revokes tokens.
///
/// Key material is injected at construction; nothing here reads the
/// environment.
#[derive(Debug)]
pub struct TokenService {
    keys: KeyRing,
    revoked: RevocationList,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(keys: KeyRing, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            keys,
            revoked: RevocationList::new(),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Issue a fresh access/refresh pair for a user.
    ///
    /// # Example
    ///
    /// ```
    /// use chrono::{Duration, Utc};
    /// use uuid::Uuid;
    /// use portcullis_core::auth::keys::KeyRing;
    /// use portcullis_core::auth::token::TokenService;
    /// use portcullis_core::models::user::{Role, User};
    ///
    /// let service = TokenService::new(
    ///     KeyRing::new("an-example-secret-at-least-32-chars", None),
    ///     Duration::minutes(30),
    ///     Duration::days(7),
    /// );
    /// let user = User {
    ///     id: Uuid::new_v4(),
    ///     tenant_id: Uuid::new_v4(),
    ///     username: "alice".into(),
    ///     email: "alice@example.com".into(),
    ///     full_name: "Alice Example".into(),
    ///     password_hash: String::new(),
    ///     role: Role::Member,
    ///     is_active: true,
    ///     created_at: Utc::now(),
    ///     updated_at: Utc::now(),
    /// };
    ///
    /// let pair = service.issue_tokens(&user).unwrap();
    /// let claims = service.verify_access_token(&pair.access_token).unwrap();
    /// assert_eq!(claims.sub, user.id);
    /// assert_eq!(pair.expires_in, 1800);
    /// ```
    pub fn issue_tokens(&self, user: &User) -> Result<TokenPair, TokenError> {
        let access = self.sign(&Claims::new(
            user.id,
            user.tenant_id,
            user.role,
            TokenType::Access,
            self.access_ttl,
        ))?;
        let refresh = self.sign(&Claims::new(
            user.id,
            user.tenant_id,
            user.role,
            TokenType::Refresh,
            self.refresh_ttl,
        ))?;

        Ok(TokenPair {
            access_token: access,
            refresh_token: refresh,
            token_type: "bearer".to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Verify an access token: signature, issuer, expiry, and type.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token, TokenType::Access)
    }

    /// Verify a refresh token, including the revocation list.
    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.verify(token, TokenType::Refresh)?;
        if self.revoked.is_revoked(claims.jti) {
            return Err(TokenError::Revoked);
        }
        Ok(claims)
    }

    /// Spend a verified refresh token and issue the replacement pair.
    ///
    /// The presented token is revoked before the new pair is minted, and the
    /// revocation doubles as a single-use claim: when the same token is
    /// presented twice concurrently, exactly one caller gets a pair and the
    /// other gets [`TokenError::Revoked`].
    pub fn rotate(&self, claims: &Claims, user: &User) -> Result<TokenPair, TokenError> {
        if !self.revoked.claim(claims.jti, claims.exp) {
            return Err(TokenError::Revoked);
        }
        self.issue_tokens(user)
    }

    /// Revoke a token by id. Unknown or already-revoked ids are accepted
    /// silently; revocation is idempotent.
    pub fn revoke(&self, jti: Uuid, expires_at: i64) {
        self.revoked.revoke(jti, expires_at);
    }

    /// Drop revocation entries for tokens that have since expired.
    pub fn purge_revocations(&self) -> usize {
        self.revoked.purge_expired()
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(self.keys.active_kid().to_string());
        encode(&header, claims, self.keys.encoding_key())
            .map_err(|e| TokenError::Create(e.to_string()))
    }

    fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let header = decode_header(token).map_err(|e| TokenError::Malformed(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| TokenError::Malformed("missing key id".to_string()))?;
        let key = self
            .keys
            .decoding_key(&kid)
            .ok_or_else(|| TokenError::Malformed(format!("unrecognized key id '{kid}'")))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        // Exact expiry. The library defaults to 60 seconds of grace.
        validation.leeway = 0;

        let data = decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) | ErrorKind::InvalidToken => {
                TokenError::Malformed(e.to_string())
            }
            _ => TokenError::Invalid(e.to_string()),
        })?;

        if data.claims.token_type != expected {
            return Err(TokenError::WrongType {
                expected,
                actual: data.claims.token_type,
            });
        }

        Ok(data.claims)
    }
}
