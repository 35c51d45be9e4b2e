//! Deterministic content fingerprints.
//!
//! Two entries with the same `(category, key, version)` but different
//! fingerprints are in conflict, so the encoding fed to the digest must be
//! canonical: each variable-length field is prefixed with its byte length
//! (big-endian u64) and the version is appended as a big-endian u64. This
//! keeps `("ab", "c")` and `("a", "bc")` from colliding.

use crate::{Error, Payload};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of a hex-encoded SHA-256 digest.
pub const HASH_LEN: usize = 64;

/// A hex-encoded SHA-256 fingerprint of an entry's identity and content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Parses a stored fingerprint, rejecting anything that is not 64
    /// lowercase hex characters.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        let valid = s.len() == HASH_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::InvalidHash(s.to_string()))
        }
    }

    /// Returns the hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the fingerprint of `(category, key, value, version)`.
#[must_use]
pub fn hash(category: &str, key: &str, value: &Payload, version: u64) -> ContentHash {
    let mut hasher = Sha256::new();
    for field in [category.as_bytes(), key.as_bytes(), value.as_bytes()] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field);
    }
    hasher.update(version.to_be_bytes());
    ContentHash(hex::encode(hasher.finalize()))
}
