//! Mutable, path-addressed tree editing.
//!
//! A [`TreeBuilder`] is the in-memory working copy of a tree. Children that
//! have not been touched stay as shared [`Tree`] snapshots; descending into
//! one for editing swaps just that child for a builder seeded from it, so
//! the snapshot itself is never mutated. Nothing here touches storage.

use std::sync::Arc;

use crate::blob::Blob;
use crate::error::{ObjectError, ObjectResult};
use crate::kind::ObjectKind;
use crate::registry::BlobKind;
use crate::tree::{validate_name, Node, Tree, TreeEntry};

/// A child held by a [`TreeBuilder`].
#[derive(Clone, Debug)]
pub enum Child {
    Blob(Arc<Blob>),
    /// An unmodified subtree snapshot.
    Tree(Arc<Tree>),
    /// A subtree being edited.
    Builder(TreeBuilder),
}

impl Child {
    /// Kind of object this child becomes when built.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Tree(_) | Self::Builder(_) => ObjectKind::Tree,
        }
    }

    /// Freeze into a snapshot node.
    pub fn to_node(&self) -> Node {
        match self {
            Self::Blob(blob) => Node::Blob(Arc::clone(blob)),
            Self::Tree(tree) => Node::Tree(Arc::clone(tree)),
            Self::Builder(builder) => Node::Tree(Arc::new(builder.build())),
        }
    }
}

impl From<Blob> for Child {
    fn from(blob: Blob) -> Self {
        Self::Blob(Arc::new(blob))
    }
}

impl From<Arc<Blob>> for Child {
    fn from(blob: Arc<Blob>) -> Self {
        Self::Blob(blob)
    }
}

impl From<Tree> for Child {
    fn from(tree: Tree) -> Self {
        Self::Tree(Arc::new(tree))
    }
}

impl From<Arc<Tree>> for Child {
    fn from(tree: Arc<Tree>) -> Self {
        Self::Tree(tree)
    }
}

impl From<TreeBuilder> for Child {
    fn from(builder: TreeBuilder) -> Self {
        Self::Builder(builder)
    }
}

impl From<Node> for Child {
    fn from(node: Node) -> Self {
        match node {
            Node::Blob(blob) => Self::Blob(blob),
            Node::Tree(tree) => Self::Tree(tree),
        }
    }
}

/// Borrowed view of whatever a path resolves to.
#[derive(Clone, Copy, Debug)]
pub enum ChildRef<'a> {
    Blob(&'a Arc<Blob>),
    Tree(&'a Arc<Tree>),
    Builder(&'a TreeBuilder),
}

impl<'a> ChildRef<'a> {
    fn of_child(child: &'a Child) -> Self {
        match child {
            Child::Blob(blob) => Self::Blob(blob),
            Child::Tree(tree) => Self::Tree(tree),
            Child::Builder(builder) => Self::Builder(builder),
        }
    }

    fn of_node(node: &'a Node) -> Self {
        match node {
            Node::Blob(blob) => Self::Blob(blob),
            Node::Tree(tree) => Self::Tree(tree),
        }
    }

    fn child(self, name: &str) -> Option<ChildRef<'a>> {
        match self {
            Self::Blob(_) => None,
            Self::Tree(tree) => tree.get_child(name).map(Self::of_node),
            Self::Builder(builder) => builder.get_child(name).map(Self::of_child),
        }
    }

    /// Kind of the referenced child.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Tree(_) | Self::Builder(_) => ObjectKind::Tree,
        }
    }

    /// The blob, if this is a blob snapshot.
    pub fn as_blob(&self) -> Option<&'a Arc<Blob>> {
        match self {
            Self::Blob(blob) => Some(blob),
            _ => None,
        }
    }

    /// The builder, if this subtree is being edited.
    pub fn as_builder(&self) -> Option<&'a TreeBuilder> {
        match self {
            Self::Builder(builder) => Some(builder),
            _ => None,
        }
    }

    /// The tree, if this is an unedited tree snapshot.
    pub fn as_tree(&self) -> Option<&'a Arc<Tree>> {
        match self {
            Self::Tree(tree) => Some(tree),
            _ => None,
        }
    }
}

/// Mutable working copy of a tree.
#[derive(Clone, Debug, Default)]
pub struct TreeBuilder {
    entries: Vec<(String, Child)>,
}

impl TreeBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a builder from a snapshot. Subtrees stay shared until edited.
    pub fn from_tree(tree: &Tree) -> Self {
        Self {
            entries: tree
                .entries()
                .iter()
                .map(|entry| (entry.name().to_string(), Child::from(entry.node().clone())))
                .collect(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    fn check_new_name(&self, name: &str) -> ObjectResult<()> {
        validate_name(name)?;
        if self.position(name).is_some() {
            return Err(ObjectError::DuplicateEntry(name.to_string()));
        }
        Ok(())
    }

    /// Append a child under `name`.
    pub fn add_child(
        &mut self,
        name: impl Into<String>,
        child: impl Into<Child>,
    ) -> ObjectResult<&mut Self> {
        let name = name.into();
        self.check_new_name(&name)?;
        self.entries.push((name, child.into()));
        Ok(self)
    }

    /// Append a new blob built from `payload`.
    pub fn create_blob<T: BlobKind>(
        &mut self,
        name: impl Into<String>,
        payload: T,
    ) -> ObjectResult<&mut Self> {
        let blob = Blob::new(payload)?;
        self.add_child(name, blob)
    }

    /// Append a new empty subtree and return it for editing.
    pub fn create_tree(&mut self, name: impl Into<String>) -> ObjectResult<&mut TreeBuilder> {
        let name = name.into();
        self.check_new_name(&name)?;
        self.entries.push((name, Child::Builder(TreeBuilder::new())));
        self.edit_child(self.entries.len() - 1)
    }

    /// Replace the entry named `name` in place, returning the old child.
    pub fn replace_child(&mut self, name: &str, child: impl Into<Child>) -> ObjectResult<Child> {
        let index = self
            .position(name)
            .ok_or_else(|| ObjectError::NoSuchEntry(name.to_string()))?;
        Ok(std::mem::replace(&mut self.entries[index].1, child.into()))
    }

    /// Remove the entry named `name`, returning it.
    pub fn remove_child(&mut self, name: &str) -> ObjectResult<Child> {
        let index = self
            .position(name)
            .ok_or_else(|| ObjectError::NoSuchEntry(name.to_string()))?;
        Ok(self.entries.remove(index).1)
    }

    /// Look up a direct child by name.
    pub fn get_child(&self, name: &str) -> Option<&Child> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, child)| child)
    }

    /// Follow a `/`-delimited path without modifying anything.
    pub fn get_path(&self, path: &str) -> Option<ChildRef<'_>> {
        let mut segments = path.split('/');
        let mut current = ChildRef::of_child(self.get_child(segments.next()?)?);
        for segment in segments {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// Ensure every segment of `path` exists as a subtree and return the
    /// innermost one. Missing segments are created empty.
    pub fn create_path(&mut self, path: &str) -> ObjectResult<&mut TreeBuilder> {
        let segments: Vec<&str> = path.split('/').collect();
        for segment in &segments {
            validate_name(segment)?;
        }

        let mut current = self;
        for segment in segments {
            let index = match current.position(segment) {
                Some(index) => index,
                None => {
                    current
                        .entries
                        .push((segment.to_string(), Child::Builder(TreeBuilder::new())));
                    current.entries.len() - 1
                }
            };
            current = current.edit_child(index)?;
        }
        Ok(current)
    }

    /// Open the subtree at `index` for editing, converting a snapshot to a
    /// builder if needed.
    fn edit_child(&mut self, index: usize) -> ObjectResult<&mut TreeBuilder> {
        let (name, child) = &mut self.entries[index];
        let seeded = match child {
            Child::Tree(tree) => Some(TreeBuilder::from_tree(tree)),
            _ => None,
        };
        if let Some(builder) = seeded {
            *child = Child::Builder(builder);
        }
        match child {
            Child::Builder(builder) => Ok(builder),
            _ => Err(ObjectError::NotATree(name.clone())),
        }
    }

    /// Freeze into an immutable tree.
    pub fn build(&self) -> Tree {
        Tree {
            entries: self
                .entries
                .iter()
                .map(|(name, child)| TreeEntry {
                    name: name.clone(),
                    node: child.to_node(),
                })
                .collect(),
        }
    }
}

impl From<&Tree> for TreeBuilder {
    fn from(tree: &Tree) -> Self {
        Self::from_tree(tree)
    }
}
