use std::collections::HashMap;
use std::sync::Arc;

use gitkv_types::{Digest, DigestAlgorithm};

use crate::blob::Blob;
use crate::commit::Commit;
use crate::envelope;
use crate::error::{ObjectError, ObjectResult};
use crate::kind::ObjectKind;
use crate::registry::KindRegistry;
use crate::tree::Tree;

/// Supplies already-decoded children while a tree or commit is decoded.
///
/// The associated error lets a storage-backed resolver surface its own I/O
/// failures through the decoder unchanged.
pub trait Resolver {
    type Error: From<ObjectError>;

    /// Produce the object of `kind` stored under `digest`.
    fn resolve(&mut self, kind: ObjectKind, digest: &Digest) -> Result<GitObject, Self::Error>;
}

/// An index of decoded objects is itself a resolver.
impl Resolver for HashMap<Digest, GitObject> {
    type Error = ObjectError;

    fn resolve(&mut self, kind: ObjectKind, digest: &Digest) -> Result<GitObject, ObjectError> {
        match self.get(digest) {
            Some(object) if object.kind() == kind => Ok(object.clone()),
            Some(object) => Err(ObjectError::parse(format!(
                "{digest} is a {}, expected {kind}",
                object.kind()
            ))),
            None => Err(ObjectError::Unresolved {
                kind,
                digest: digest.clone(),
            }),
        }
    }
}

/// Parse a digest as written inside a tree or commit body.
///
/// Only lowercase hex is accepted, so a decoded object re-encodes to the
/// exact bytes it was read from.
pub(crate) fn parse_digest(value: &str) -> ObjectResult<Digest> {
    Digest::from_canonical_hex(value)
        .map_err(|e| ObjectError::parse(format!("bad digest {value:?}: {e}")))
}

/// Any stored object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GitObject {
    Blob(Arc<Blob>),
    Tree(Arc<Tree>),
    Commit(Arc<Commit>),
}

impl GitObject {
    /// The kind discriminator.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Tree(_) => ObjectKind::Tree,
            Self::Commit(_) => ObjectKind::Commit,
        }
    }

    /// Canonical body bytes.
    pub fn encode(&self, algorithm: DigestAlgorithm) -> Vec<u8> {
        match self {
            Self::Blob(blob) => blob.encode().to_vec(),
            Self::Tree(tree) => tree.encode(algorithm).into_bytes(),
            Self::Commit(commit) => commit.encode(algorithm).into_bytes(),
        }
    }

    /// The bytes that are hashed and stored: envelope plus body.
    pub fn file_contents(&self, algorithm: DigestAlgorithm) -> Vec<u8> {
        envelope::wrap(self.kind(), &self.encode(algorithm))
    }

    /// Digest of the envelope, which is also the storage key.
    pub fn digest(&self, algorithm: DigestAlgorithm) -> Digest {
        algorithm.hash(&self.file_contents(algorithm))
    }

    /// Direct children to recurse into when persisting.
    pub fn descendants(&self) -> Vec<GitObject> {
        match self {
            Self::Blob(_) => Vec::new(),
            Self::Tree(tree) => tree
                .entries()
                .iter()
                .map(|entry| GitObject::from(entry.node().clone()))
                .collect(),
            Self::Commit(commit) => vec![Self::Tree(Arc::clone(commit.tree()))],
        }
    }

    /// Decode a body of the given kind.
    pub fn decode<R: Resolver>(
        kind: ObjectKind,
        body: &[u8],
        registry: &KindRegistry,
        resolver: &mut R,
    ) -> Result<Self, R::Error> {
        Ok(match kind {
            ObjectKind::Blob => Self::Blob(Arc::new(Blob::decode(body, registry)?)),
            ObjectKind::Tree => Self::Tree(Arc::new(Tree::decode(body, resolver)?)),
            ObjectKind::Commit => Self::Commit(Arc::new(Commit::decode(body, resolver)?)),
        })
    }

    /// Split stored file contents and decode the body.
    pub fn parse<R: Resolver>(
        contents: &[u8],
        registry: &KindRegistry,
        resolver: &mut R,
    ) -> Result<Self, R::Error> {
        let (kind, body) = envelope::split(contents)?;
        Self::decode(kind, body, registry, resolver)
    }

    /// The blob, if this is one.
    pub fn as_blob(&self) -> Option<&Arc<Blob>> {
        match self {
            Self::Blob(blob) => Some(blob),
            _ => None,
        }
    }

    /// The tree, if this is one.
    pub fn as_tree(&self) -> Option<&Arc<Tree>> {
        match self {
            Self::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    /// The commit, if this is one.
    pub fn as_commit(&self) -> Option<&Arc<Commit>> {
        match self {
            Self::Commit(commit) => Some(commit),
            _ => None,
        }
    }

    /// Whether both values are the same in-memory instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Blob(a), Self::Blob(b)) => Arc::ptr_eq(a, b),
            (Self::Tree(a), Self::Tree(b)) => Arc::ptr_eq(a, b),
            (Self::Commit(a), Self::Commit(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Blob> for GitObject {
    fn from(blob: Blob) -> Self {
        Self::Blob(Arc::new(blob))
    }
}

impl From<Arc<Blob>> for GitObject {
    fn from(blob: Arc<Blob>) -> Self {
        Self::Blob(blob)
    }
}

impl From<Tree> for GitObject {
    fn from(tree: Tree) -> Self {
        Self::Tree(Arc::new(tree))
    }
}

impl From<Arc<Tree>> for GitObject {
    fn from(tree: Arc<Tree>) -> Self {
        Self::Tree(tree)
    }
}

impl From<Commit> for GitObject {
    fn from(commit: Commit) -> Self {
        Self::Commit(Arc::new(commit))
    }
}

impl From<Arc<Commit>> for GitObject {
    fn from(commit: Arc<Commit>) -> Self {
        Self::Commit(commit)
    }
}
