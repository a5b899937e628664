//! Content addressing for vault blobs using SHA-256.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{EngineError, EngineResult};

/// A SHA-256 content hash, stored and displayed as 64 lowercase hex chars.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash the given code blob.
    pub fn of(code: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(code.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an already-computed hex digest (e.g. read back from the vault).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that `code` still hashes to this value.
    ///
    /// A mismatch is the fatal integrity error for the current call; it is
    /// never repaired in place.
    pub fn verify(&self, code: &str) -> EngineResult<()> {
        let computed = ContentHash::of(code);
        if computed != *self {
            return Err(EngineError::Integrity {
                detail: format!(
                    "hash mismatch: expected '{}', got '{}'; vault content may be corrupted",
                    self.0, computed.0
                ),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(String::deserialize(deserializer)?))
    }
}
