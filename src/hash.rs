//! Hash utilities (C1): `sha256_hex` and hash-length classification.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::HashError;

/// Maximum size of inline content, in bytes.
pub const MAX_INLINE_SIZE: usize = 200_000;

/// Below this length a hash string is treated as the native/opaque
/// content-addressing scheme.
const NATIVE_MAX_LEN: usize = 46;

/// Opaque, printable content hash identifying an immutable byte payload.
///
/// Unlike `network::protocol::Hash` in block-level code (a fixed 64-byte
/// binary digest), this `Hash` is whatever printable string scheme the
/// referencing engine produced: a hex sha256 digest for `Storage`, or a CID
/// string for `Ipfs`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash(pub String);

impl Hash {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Hash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Hash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The kind of content-addressing engine a message's `item_hash` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Inline,
    Storage,
    Ipfs,
}

impl Default for ItemType {
    /// Matches the original's `ItemType.IPFS` default for `item_type` when a
    /// message omits it.
    fn default() -> Self {
        ItemType::Ipfs
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ItemType::Inline => "inline",
            ItemType::Storage => "storage",
            ItemType::Ipfs => "ipfs",
        };
        write!(f, "{}", s)
    }
}

/// sha256(bytes) as lower-case hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Classify `hash` by length, per the content-addressing scheme bands:
/// `< 46` chars is the native/opaque scheme (`Storage`); `>= 46` chars
/// covers both distributed-network versions (`Ipfs`), which are
/// distinguished later by `CidVersion` when actually computing a hash, not
/// at classification time.
///
/// Fails with `InvalidHash` if `hash` is empty or contains non-printable
/// characters.
pub fn classify(hash: &Hash) -> Result<ItemType, HashError> {
    let s = hash.as_str();
    if s.is_empty() || s.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(HashError::InvalidHash(s.to_string()));
    }

    if s.chars().count() < NATIVE_MAX_LEN {
        Ok(ItemType::Storage)
    } else {
        Ok(ItemType::Ipfs)
    }
}

/// CID version to use when hashing content through a `DistributedContentNetwork`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CidVersion {
    V0,
    V1,
}

/// The threshold at which the distributed-network scheme switches from CID
/// v0 (`< 58` chars) to CID v1 (`>= 58` chars), per §3/§4.3.
pub fn cid_version_for_expected_hash(expected: &Hash) -> CidVersion {
    if expected.as_str().chars().count() < 58 {
        CidVersion::V0
    } else {
        CidVersion::V1
    }
}
