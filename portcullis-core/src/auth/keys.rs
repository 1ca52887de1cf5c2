//! Signing key ring.
//!
//! Tokens are always signed with the active key, but verification accepts
//! the active key plus an optional previous key. That lets the signing
//! secret rotate without invalidating tokens issued before the rollover:
//! deploy the new secret with the old one as "previous", wait out the
//! longest token lifetime, then drop the old secret.
//!
//! Each key is identified by a short fingerprint carried in the token
//! header. A token whose fingerprint matches no configured key is treated
//! as malformed, not merely invalid, since it was never ours to verify.

use std::fmt;

use jsonwebtoken::{DecodingKey, EncodingKey};
use sha2::{Digest, Sha256};

/// Fingerprint of a signing secret: first eight bytes of its SHA-256, hex.
fn key_id(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    hex::encode(&digest[..8])
}

/// The set of keys accepted for token verification.
#[derive(Clone)]
pub struct KeyRing {
    active_kid: String,
    encoding: EncodingKey,
    decoding: Vec<(String, DecodingKey)>,
}

impl KeyRing {
    /// Build a ring from the active signing secret and, during a rotation
    /// window, the previous one.
    pub fn new(active_secret: &str, previous_secret: Option<&str>) -> Self {
        let active_kid = key_id(active_secret);
        let mut decoding = vec![(
            active_kid.clone(),
            DecodingKey::from_secret(active_secret.as_bytes()),
        )];

        if let Some(previous) = previous_secret {
            let kid = key_id(previous);
            if kid != active_kid {
                decoding.push((kid, DecodingKey::from_secret(previous.as_bytes())));
            }
        }

        Self {
            active_kid,
            encoding: EncodingKey::from_secret(active_secret.as_bytes()),
            decoding,
        }
    }

    /// Fingerprint stamped into the header of newly issued tokens.
    pub fn active_kid(&self) -> &str {
        &self.active_kid
    }

    /// Key used to sign new tokens.
    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    /// Look up a verification key by fingerprint.
    pub fn decoding_key(&self, kid: &str) -> Option<&DecodingKey> {
        self.decoding
            .iter()
            .find(|(id, _)| id == kid)
            .map(|(_, key)| key)
    }

    /// Number of keys currently accepted for verification.
    pub fn key_count(&self) -> usize {
        self.decoding.len()
    }
}

// Key material stays out of Debug output.
impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRing")
            .field("active_kid", &self.active_kid)
            .field("key_count", &self.decoding.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_for_a_secret() {
        let a = KeyRing::new("a-signing-secret-of-decent-length!!", None);
        let b = KeyRing::new("a-signing-secret-of-decent-length!!", None);
        assert_eq!(a.active_kid(), b.active_kid());
        assert_eq!(a.active_kid().len(), 16);
    }

    #[test]
    fn distinct_secrets_get_distinct_fingerprints() {
        let a = KeyRing::new("first-secret-first-secret-first!!!!", None);
        let b = KeyRing::new("second-secret-second-secret-two!!!!", None);
        assert_ne!(a.active_kid(), b.active_kid());
    }

    #[test]
    fn previous_key_is_available_for_verification() {
        let old = KeyRing::new("old-secret-old-secret-old-secret!!!", None);
        let ring = KeyRing::new(
            "new-secret-new-secret-new-secret!!!",
            Some("old-secret-old-secret-old-secret!!!"),
        );

        assert_eq!(ring.key_count(), 2);
        assert!(ring.decoding_key(old.active_kid()).is_some());
        assert_ne!(ring.active_kid(), old.active_kid());
    }

    #[test]
    fn unknown_fingerprint_finds_nothing() {
        let ring = KeyRing::new("just-the-one-secret-right-here!!!!!", None);
        assert!(ring.decoding_key("0000000000000000").is_none());
    }

    #[test]
    fn repeated_secret_is_not_double_counted() {
        let ring = KeyRing::new(
            "same-secret-same-secret-same-one!!!",
            Some("same-secret-same-secret-same-one!!!"),
        );
        assert_eq!(ring.key_count(), 1);
    }
}
