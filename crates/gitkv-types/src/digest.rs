use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Byte lengths a digest may have: SHA-1 (20) and BLAKE3 (32).
const VALID_LENGTHS: [usize; 2] = [20, 32];

/// Content-addressed identifier for a stored object.
///
/// A `Digest` is the hash of an object's canonical file contents, kept as
/// lowercase hex. Identical content always produces the same `Digest`, which
/// is also the key the object is stored under.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
    /// Wrap raw hash output. Callers pass only 20 or 32 bytes.
    pub(crate) fn from_raw(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Parse from a hex string. Upper-case input is normalized.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if !VALID_LENGTHS.contains(&bytes.len()) {
            return Err(TypeError::InvalidLength {
                actual: bytes.len(),
            });
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Parse hex exactly as it appears in an encoded object.
    ///
    /// Unlike [`from_hex`](Self::from_hex), upper-case input is rejected, so
    /// the parsed digest always renders back to the same text.
    pub fn from_canonical_hex(s: &str) -> Result<Self, TypeError> {
        if s.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(TypeError::NotCanonical(s.to_string()));
        }
        Self::from_hex(s)
    }

    /// The hex text, as used for storage keys.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> &str {
        &self.0[..8]
    }

    /// Raw digest bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        // The inner string is validated hex by construction.
        hex::decode(&self.0).unwrap_or_default()
    }
}

impl From<[u8; 20]> for Digest {
    fn from(bytes: [u8; 20]) -> Self {
        Self::from_raw(&bytes)
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self::from_raw(&bytes)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Digest {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
