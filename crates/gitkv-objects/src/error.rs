//! Error types for object encoding, decoding and tree editing.

use gitkv_types::Digest;

use crate::kind::ObjectKind;

/// Errors that can occur while building, encoding or decoding objects.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    /// The envelope or body is malformed.
    #[error("parse error: {0}")]
    Parse(String),

    /// An envelope kind or blob type tag is not recognized.
    #[error("unknown kind: {0}")]
    UnknownKind(String),

    /// A tree or commit references a child the resolver could not supply.
    #[error("unresolved {kind} reference {digest}")]
    Unresolved { kind: ObjectKind, digest: Digest },

    /// An entry name is empty or contains a reserved character.
    #[error("invalid entry name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A tree already holds an entry with this name.
    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    /// No entry with this name exists in the tree.
    #[error("no such entry: {0}")]
    NoSuchEntry(String),

    /// A path segment names a blob where a tree was required.
    #[error("not a tree: {0}")]
    NotATree(String),

    /// A commit attribute cannot be rendered as a header line.
    #[error("invalid commit attribute {key:?}: {reason}")]
    InvalidAttribute { key: String, reason: String },

    /// A blob payload could not be serialized or reconstructed.
    #[error("payload error: {0}")]
    Payload(String),
}

impl ObjectError {
    pub(crate) fn parse(reason: impl Into<String>) -> Self {
        Self::Parse(reason.into())
    }
}

/// Convenience alias for object results.
pub type ObjectResult<T> = Result<T, ObjectError>;
