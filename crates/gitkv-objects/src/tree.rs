use std::collections::HashSet;
use std::sync::Arc;

use gitkv_types::{Digest, DigestAlgorithm};

use crate::blob::Blob;
use crate::envelope;
use crate::error::{ObjectError, ObjectResult};
use crate::kind::{EntryMode, ObjectKind};
use crate::object::{parse_digest, GitObject, Resolver};

/// A child reachable from a tree entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Blob(Arc<Blob>),
    Tree(Arc<Tree>),
}

impl Node {
    /// Kind of the child.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Tree(_) => ObjectKind::Tree,
        }
    }

    /// Entry mode matching the child's kind.
    pub fn mode(&self) -> EntryMode {
        match self {
            Self::Blob(_) => EntryMode::Regular,
            Self::Tree(_) => EntryMode::Directory,
        }
    }

    /// Digest of the child.
    pub fn digest(&self, algorithm: DigestAlgorithm) -> Digest {
        match self {
            Self::Blob(blob) => blob.digest(algorithm),
            Self::Tree(tree) => tree.digest(algorithm),
        }
    }

    /// The blob, if this child is one.
    pub fn as_blob(&self) -> Option<&Arc<Blob>> {
        match self {
            Self::Blob(blob) => Some(blob),
            Self::Tree(_) => None,
        }
    }

    /// The tree, if this child is one.
    pub fn as_tree(&self) -> Option<&Arc<Tree>> {
        match self {
            Self::Tree(tree) => Some(tree),
            Self::Blob(_) => None,
        }
    }

    /// Whether both nodes are the same in-memory instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Blob(a), Self::Blob(b)) => Arc::ptr_eq(a, b),
            (Self::Tree(a), Self::Tree(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Node> for GitObject {
    fn from(node: Node) -> Self {
        match node {
            Node::Blob(blob) => GitObject::Blob(blob),
            Node::Tree(tree) => GitObject::Tree(tree),
        }
    }
}

/// A named entry in a tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    pub(crate) name: String,
    pub(crate) node: Node,
}

impl TreeEntry {
    /// Create an entry, validating the name.
    pub fn new(name: impl Into<String>, node: Node) -> ObjectResult<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { name, node })
    }

    /// The entry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The referenced child.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Entry mode of the child.
    pub fn mode(&self) -> EntryMode {
        self.node.mode()
    }

    /// The `<mode> <kind> <digest> <name>` line for this entry.
    pub fn encode(&self, algorithm: DigestAlgorithm) -> String {
        format!(
            "{} {} {} {}",
            self.node.mode(),
            self.node.kind(),
            self.node.digest(algorithm),
            self.name
        )
    }
}

/// Immutable directory listing (analogous to a git tree).
///
/// Entries keep insertion order; the encoding is not sorted. Use
/// [`TreeBuilder`](crate::TreeBuilder) to assemble or edit a tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tree {
    pub(crate) entries: Vec<TreeEntry>,
}

impl Tree {
    /// A tree with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a tree from entries. Names must be unique.
    pub fn from_entries(entries: Vec<TreeEntry>) -> ObjectResult<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(ObjectError::DuplicateEntry(entry.name.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// Entries in encoding order.
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of the entry named `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Look up a direct child by name.
    pub fn get_child(&self, name: &str) -> Option<&Node> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.node)
    }

    /// Follow a `/`-delimited path. Returns `None` if any segment is absent
    /// or passes through a blob.
    pub fn get_path(&self, path: &str) -> Option<&Node> {
        let mut segments = path.split('/');
        let mut node = self.get_child(segments.next()?)?;
        for segment in segments {
            node = node.as_tree()?.get_child(segment)?;
        }
        Some(node)
    }

    /// Canonical body: one entry line per child, newline-joined.
    pub fn encode(&self, algorithm: DigestAlgorithm) -> String {
        self.entries
            .iter()
            .map(|entry| entry.encode(algorithm))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Digest of this tree's envelope.
    pub fn digest(&self, algorithm: DigestAlgorithm) -> Digest {
        algorithm.hash(&envelope::wrap(
            ObjectKind::Tree,
            self.encode(algorithm).as_bytes(),
        ))
    }

    /// Decode a tree body, resolving every referenced child.
    pub fn decode<R: Resolver>(body: &[u8], resolver: &mut R) -> Result<Self, R::Error> {
        let text = std::str::from_utf8(body)
            .map_err(|_| ObjectError::parse("tree body is not UTF-8"))?;
        if text.is_empty() {
            return Ok(Self::empty());
        }

        let mut entries = Vec::new();
        for line in text.split('\n') {
            let mut parts = line.splitn(4, ' ');
            let (Some(mode), Some(kind), Some(digest), Some(name)) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(ObjectError::parse(format!("malformed tree line {line:?}")).into());
            };

            let mode: EntryMode = mode.parse()?;
            let kind: ObjectKind = kind.parse()?;
            if mode.kind() != kind {
                let reason = format!("mode {mode} does not match kind {kind}");
                return Err(ObjectError::parse(reason).into());
            }
            let digest = parse_digest(digest)?;
            validate_name(name)?;

            let node = match resolver.resolve(kind, &digest)? {
                GitObject::Blob(blob) if kind == ObjectKind::Blob => Node::Blob(blob),
                GitObject::Tree(tree) if kind == ObjectKind::Tree => Node::Tree(tree),
                other => {
                    return Err(ObjectError::parse(format!(
                        "entry {name:?} declared {kind} but resolved to {}",
                        other.kind()
                    ))
                    .into())
                }
            };
            entries.push(TreeEntry {
                name: name.to_string(),
                node,
            });
        }
        Ok(Self { entries })
    }
}

/// Entry names are path-local labels: non-empty, no `/`, newline or NUL.
pub(crate) fn validate_name(name: &str) -> ObjectResult<()> {
    let reason = if name.is_empty() {
        "name must not be empty"
    } else if name.contains('/') {
        "name must not contain '/'"
    } else if name.contains('\n') {
        "name must not contain a newline"
    } else if name.contains('\0') {
        "name must not contain NUL"
    } else {
        return Ok(());
    };
    Err(ObjectError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    })
}
