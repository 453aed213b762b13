//! Content-addressed object store for gitkv.
//!
//! An [`ObjectStore`] persists object graphs into any [`KvBackend`], keyed
//! by digest, and keeps one head ref pointing at the newest commit.
//!
//! # Backends
//!
//! - [`InMemoryBackend`] -- `HashMap` behind a lock, for tests and embedding
//! - [`FsBackend`] -- one file per key under a directory
//!
//! # Writing
//!
//! [`ObjectStore::save`] writes children before parents and skips anything
//! already stored, so saving an unchanged graph costs one existence check.
//! [`ObjectStore::commit`] saves a tree under a new commit and advances the
//! head with compare-and-swap.
//!
//! # Reading
//!
//! [`ObjectStore::load`] decodes an object and its whole subgraph. Loads
//! that share a [`LoadCache`] share decoded instances.

pub mod backend;
pub mod config;
pub mod error;
pub mod fs;
pub mod head;
pub mod memory;
pub mod store;

pub use backend::{KvBackend, Swap};
pub use config::StoreConfig;
pub use error::{BackendError, BackendResult, StoreError, StoreResult};
pub use fs::FsBackend;
pub use head::HeadRef;
pub use memory::InMemoryBackend;
pub use store::{LoadCache, ObjectStore};
