//! Object model for gitkv.
//!
//! Three object kinds share one addressing scheme: each is encoded to a
//! canonical body, wrapped in a `<kind> <length>\0` envelope, and hashed.
//! Trees reference children by digest, so the whole graph is a Merkle DAG
//! and identical subgraphs always collapse to identical digests.
//!
//! # Object Types
//!
//! - [`Blob`] -- registry-tagged structured payload
//! - [`Tree`] -- ordered, named child references
//! - [`Commit`] -- root tree, optional parent, attributes and message
//!
//! Persisted objects are immutable snapshots shared through `Arc`. Edits go
//! through a [`TreeBuilder`], which produces a new [`Tree`].
//!
//! # Extension
//!
//! Blob payload types are registered in a [`KindRegistry`] by tag and
//! reconstructed through it on decode.

pub mod blob;
pub mod builder;
pub mod commit;
pub mod envelope;
pub mod error;
pub mod kind;
pub mod object;
pub mod registry;
pub mod tree;

pub use blob::Blob;
pub use builder::{Child, ChildRef, TreeBuilder};
pub use commit::Commit;
pub use error::{ObjectError, ObjectResult};
pub use kind::{EntryMode, ObjectKind};
pub use object::{GitObject, Resolver};
pub use registry::{BlobKind, BlobPayload, Fields, KindRegistry, DEFAULT_KIND};
pub use tree::{Node, Tree, TreeEntry};
