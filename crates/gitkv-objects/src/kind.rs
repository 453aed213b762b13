use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ObjectError;

/// The kind of an object, as written in its envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Registry-tagged structured payload.
    Blob,
    /// Ordered list of named child references.
    Tree,
    /// Snapshot of a root tree plus history metadata.
    Commit,
}

impl ObjectKind {
    /// The literal used in envelopes and tree lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = ObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blob" => Ok(Self::Blob),
            "tree" => Ok(Self::Tree),
            "commit" => Ok(Self::Commit),
            other => Err(ObjectError::UnknownKind(other.to_string())),
        }
    }
}

/// File mode of a tree entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryMode {
    /// Blob entry (`100644`).
    Regular,
    /// Subtree entry (`040000`).
    Directory,
}

impl EntryMode {
    /// The mode an entry of the given kind is written with.
    ///
    /// Commits cannot appear in trees, so they have no mode.
    pub fn for_kind(kind: ObjectKind) -> Option<Self> {
        match kind {
            ObjectKind::Blob => Some(Self::Regular),
            ObjectKind::Tree => Some(Self::Directory),
            ObjectKind::Commit => None,
        }
    }

    /// The kind this mode implies.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Regular => ObjectKind::Blob,
            Self::Directory => ObjectKind::Tree,
        }
    }

    /// The mode literal written in tree lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "100644",
            Self::Directory => "040000",
        }
    }
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryMode {
    type Err = ObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "100644" => Ok(Self::Regular),
            "040000" => Ok(Self::Directory),
            other => Err(ObjectError::parse(format!("unsupported entry mode {other:?}"))),
        }
    }
}
