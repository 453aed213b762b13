use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::Digest as _;

use crate::digest::Digest;
use crate::error::TypeError;

/// The hash function objects are addressed by.
///
/// The store treats this as an opaque `hash(bytes) -> Digest` boundary; any
/// variant is acceptable as long as a given store always uses the same one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-1, 40 hex characters. Matches git-style object keys.
    #[default]
    Sha1,
    /// BLAKE3, 64 hex characters.
    Blake3,
}

impl DigestAlgorithm {
    /// Hash raw bytes.
    pub fn hash(&self, data: &[u8]) -> Digest {
        match self {
            Self::Sha1 => Digest::from_raw(&sha1::Sha1::digest(data)),
            Self::Blake3 => Digest::from_raw(blake3::hash(data).as_bytes()),
        }
    }

    /// Digest length in hex characters.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Blake3 => 64,
        }
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &Digest) -> bool {
        self.hash(data) == *expected
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "sha1"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha1" => Ok(Self::Sha1),
            "blake3" => Ok(Self::Blake3),
            other => Err(TypeError::UnknownAlgorithm(other.to_string())),
        }
    }
}
