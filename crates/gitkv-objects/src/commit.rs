use std::collections::HashSet;
use std::sync::Arc;

use gitkv_types::{Digest, DigestAlgorithm};

use crate::builder::TreeBuilder;
use crate::envelope;
use crate::error::{ObjectError, ObjectResult};
use crate::kind::ObjectKind;
use crate::object::{parse_digest, GitObject, Resolver};
use crate::tree::Tree;

/// A snapshot of a root tree with its place in history.
///
/// Body layout:
///
/// ```text
/// tree <digest>
/// parent <digest>        (absent on the first commit)
/// <key> <value>          (one per attribute, in insertion order)
///
/// <message>
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    parent: Option<Digest>,
    tree: Arc<Tree>,
    attributes: Vec<(String, String)>,
    message: String,
}

impl Commit {
    /// Create a commit, validating that every attribute renders as a single
    /// header line and that no key repeats.
    pub fn new<I, K, V>(
        parent: Option<Digest>,
        tree: impl Into<Arc<Tree>>,
        attributes: I,
        message: impl Into<String>,
    ) -> ObjectResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let attributes: Vec<(String, String)> = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let mut seen = HashSet::new();
        for (key, value) in &attributes {
            validate_attribute(key, value)?;
            if !seen.insert(key.as_str()) {
                return Err(ObjectError::InvalidAttribute {
                    key: key.clone(),
                    reason: "key appears more than once".into(),
                });
            }
        }
        Ok(Self {
            parent,
            tree: tree.into(),
            attributes,
            message: message.into(),
        })
    }

    /// Digest of the previous commit.
    pub fn parent(&self) -> Option<&Digest> {
        self.parent.as_ref()
    }

    /// Whether this is the first commit in its history.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// The root tree.
    pub fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    /// Attributes in the order they are encoded.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Value of the attribute named `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The message text, verbatim.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// A builder seeded from this commit's tree, for preparing the next one.
    pub fn edit_tree(&self) -> TreeBuilder {
        TreeBuilder::from_tree(&self.tree)
    }

    /// Canonical body text.
    pub fn encode(&self, algorithm: DigestAlgorithm) -> String {
        let mut header = vec![format!("tree {}", self.tree.digest(algorithm))];
        if let Some(parent) = &self.parent {
            header.push(format!("parent {parent}"));
        }
        for (key, value) in &self.attributes {
            header.push(format!("{key} {value}"));
        }
        format!("{}\n\n{}", header.join("\n"), self.message)
    }

    /// Digest of this commit's envelope.
    pub fn digest(&self, algorithm: DigestAlgorithm) -> Digest {
        algorithm.hash(&envelope::wrap(
            ObjectKind::Commit,
            self.encode(algorithm).as_bytes(),
        ))
    }

    /// Decode a commit body, resolving its root tree.
    ///
    /// Only bodies in canonical layout are accepted: `tree` first, then an
    /// optional `parent`, then attributes with distinct keys.
    pub fn decode<R: Resolver>(body: &[u8], resolver: &mut R) -> Result<Self, R::Error> {
        let text = std::str::from_utf8(body)
            .map_err(|_| ObjectError::parse("commit body is not UTF-8"))?;
        let (header, message) = text.split_once("\n\n").ok_or_else(|| {
            ObjectError::parse("commit body has no blank line before the message")
        })?;

        let mut lines = header.split('\n').peekable();
        let tree_digest = match lines.next().and_then(|line| line.strip_prefix("tree ")) {
            Some(value) => parse_digest(value)?,
            None => {
                return Err(ObjectError::parse("commit must start with a tree header").into())
            }
        };
        let parent = match lines.peek().and_then(|line| line.strip_prefix("parent ")) {
            Some(value) => {
                let parent = parse_digest(value)?;
                lines.next();
                Some(parent)
            }
            None => None,
        };

        let mut attributes: Vec<(String, String)> = Vec::new();
        for line in lines {
            let (key, value) = line
                .split_once(' ')
                .ok_or_else(|| ObjectError::parse(format!("malformed commit header {line:?}")))?;
            validate_attribute(key, value)
                .map_err(|e| ObjectError::parse(format!("commit header {line:?}: {e}")))?;
            if attributes.iter().any(|(k, _)| k == key) {
                return Err(ObjectError::parse(format!("repeated commit header {key:?}")).into());
            }
            attributes.push((key.to_string(), value.to_string()));
        }

        let tree = match resolver.resolve(ObjectKind::Tree, &tree_digest)? {
            GitObject::Tree(tree) => tree,
            other => {
                return Err(ObjectError::parse(format!(
                    "commit tree {tree_digest} resolved to a {}",
                    other.kind()
                ))
                .into())
            }
        };

        Ok(Self {
            parent,
            tree,
            attributes,
            message: message.to_string(),
        })
    }
}

fn validate_attribute(key: &str, value: &str) -> ObjectResult<()> {
    let reason = if key.is_empty() {
        "key must not be empty"
    } else if key.chars().any(|c| c == ' ' || c == '\n') {
        "key must not contain spaces or newlines"
    } else if key == "tree" || key == "parent" {
        "key is a reserved header"
    } else if value.contains('\n') {
        "value must not contain a newline"
    } else {
        return Ok(());
    };
    Err(ObjectError::InvalidAttribute {
        key: key.to_string(),
        reason: reason.into(),
    })
}
