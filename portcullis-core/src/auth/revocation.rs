//! Refresh-token revocation list.
//!
//! Revocation is keyed by the token's unique `jti` claim, not by the token
//! string, so a token cannot dodge the denylist through re-encoding. Entries
//! carry the token's expiry and can be purged once they would have expired
//! anyway, which bounds the list to the set of live refresh tokens.

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

/// Set of revoked token identifiers with their expiry timestamps.
///
/// Backed by a sharded concurrent map: lookups and inserts for different
/// identifiers do not contend on a single lock.
#[derive(Debug, Default)]
pub struct RevocationList {
    entries: DashMap<Uuid, i64>,
}

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a token identifier as revoked until `expires_at` (unix seconds).
    ///
    /// Revoking an identifier twice, or one that was never issued, is a
    /// no-op success.
    pub fn revoke(&self, jti: Uuid, expires_at: i64) {
        self.entries.insert(jti, expires_at);
    }

    /// Revoke an identifier and report whether this call was the one that
    /// revoked it.
    ///
    /// The insert happens under the identifier's shard lock, so when two
    /// requests present the same token concurrently exactly one sees `true`.
    /// Rotation uses this to guarantee a refresh token is spent only once.
    pub fn claim(&self, jti: Uuid, expires_at: i64) -> bool {
        self.entries.insert(jti, expires_at).is_none()
    }

    pub fn is_revoked(&self, jti: Uuid) -> bool {
        self.entries.contains_key(&jti)
    }

    /// Drop entries whose tokens have expired on their own. Returns the
    /// number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now().timestamp();
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
