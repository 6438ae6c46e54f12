//! # Content Digests
//!
//! SHA-256 digests used for two purposes:
//!
//! - **Content checksums.** [`content_checksum`] fingerprints raw document
//!   content so byte-identical documents collapse to one cache entry.
//! - **Record digests.** [`json_digest`] hashes the JSON serialization of an
//!   audit record. Struct fields serialize in declaration order, so the same
//!   record always produces the same digest.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::identity::Checksum;

/// A SHA-256 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest {
    /// The raw 32-byte digest value.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Return the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

/// Compute the SHA-256 digest of raw bytes.
pub fn sha256_digest(data: &[u8]) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    ContentDigest::from_bytes(hasher.finalize().into())
}

/// Fingerprint document content as a lowercase hex SHA-256 [`Checksum`].
pub fn content_checksum(content: &str) -> Checksum {
    Checksum(sha256_digest(content.as_bytes()).to_hex())
}

/// Digest the JSON serialization of `value`.
pub fn json_digest<T: Serialize>(value: &T) -> Result<ContentDigest, serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    Ok(sha256_digest(&bytes))
}
