use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use gitkv_objects::{Commit, GitObject, KindRegistry, ObjectError, ObjectKind, Resolver, Tree};
use gitkv_types::{Digest, DigestAlgorithm};
use tracing::debug;

use crate::backend::KvBackend;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::head::HeadRef;

/// Decoded objects by digest.
///
/// Reusing one cache across loads makes every repeated reference to a digest
/// resolve to the same in-memory instance, and skips decoding it again.
#[derive(Clone, Debug, Default)]
pub struct LoadCache {
    objects: HashMap<Digest, GitObject>,
}

impl LoadCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of decoded objects held.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if nothing has been decoded yet.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// The decoded object for `digest`, if cached.
    pub fn get(&self, digest: &Digest) -> Option<&GitObject> {
        self.objects.get(digest)
    }

    /// Whether `digest` has been decoded.
    pub fn contains(&self, digest: &Digest) -> bool {
        self.objects.contains_key(digest)
    }
}

/// Content-addressed persistence of object graphs over a [`KvBackend`].
///
/// Every object is stored under the hex digest of its envelope. The only
/// mutable key is the head ref, which is advanced with compare-and-swap.
pub struct ObjectStore<B> {
    backend: B,
    config: StoreConfig,
    head: HeadRef,
    registry: KindRegistry,
}

impl<B: KvBackend> ObjectStore<B> {
    /// Open a store over `backend`. Fails if `config` is invalid.
    pub fn new(backend: B, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let head = HeadRef::new(config.head_ref.clone())?;
        Ok(Self {
            backend,
            config,
            head,
            registry: KindRegistry::new(),
        })
    }

    /// Replace the kind registry used to decode blobs.
    pub fn with_registry(mut self, registry: KindRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The underlying key-value backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The configuration the store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Digest function objects are keyed by.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.config.digest
    }

    /// The head ref this store advances.
    pub fn head_ref(&self) -> &HeadRef {
        &self.head
    }

    /// Kinds available when decoding blobs.
    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    /// Register application blob kinds here before loading them.
    pub fn registry_mut(&mut self) -> &mut KindRegistry {
        &mut self.registry
    }

    /// Whether an object with this digest is stored.
    pub fn contains(&self, digest: &Digest) -> StoreResult<bool> {
        Ok(self.backend.has(digest.as_str())?)
    }

    /// Persist `object` and everything reachable from it, returning its digest.
    ///
    /// Children are written before their parent, and any object already
    /// present is skipped together with its whole subgraph, so an object is
    /// only ever stored once all of its children are.
    pub fn save(&self, object: &GitObject) -> StoreResult<Digest> {
        let algorithm = self.algorithm();
        let contents = object.file_contents(algorithm);
        let digest = algorithm.hash(&contents);
        // A stored key implies its whole subgraph is stored, because children
        // are always written first.
        if self.backend.has(digest.as_str())? {
            return Ok(digest);
        }

        for child in object.descendants() {
            self.save(&child)?;
        }
        self.backend.set(digest.as_str(), &contents)?;
        debug!(
            digest = %digest.short_hex(),
            kind = %object.kind(),
            bytes = contents.len(),
            "stored object"
        );
        Ok(digest)
    }

    /// Load the object stored under `digest` with all of its children.
    pub fn load(&self, digest: &Digest) -> StoreResult<GitObject> {
        self.load_with(digest, &mut LoadCache::new())
    }

    /// Like [`load`](Self::load), resolving through and filling `cache`.
    pub fn load_with(&self, digest: &Digest, cache: &mut LoadCache) -> StoreResult<GitObject> {
        if let Some(object) = cache.get(digest) {
            return Ok(object.clone());
        }

        let contents = self
            .backend
            .get(digest.as_str())?
            .ok_or_else(|| StoreError::NotFound(digest.clone()))?;
        let algorithm = self.algorithm();
        if self.config.verify_on_load && !algorithm.verify(&contents, digest) {
            return Err(StoreError::HashMismatch {
                expected: digest.clone(),
                computed: algorithm.hash(&contents),
            });
        }

        let object = GitObject::parse(
            &contents,
            &self.registry,
            &mut Loader {
                store: self,
                cache: &mut *cache,
            },
        )?;
        debug!(digest = %digest.short_hex(), kind = %object.kind(), "decoded object");
        cache.objects.insert(digest.clone(), object.clone());
        Ok(object)
    }

    /// Load a commit, failing if `digest` names another kind of object.
    pub fn load_commit(&self, digest: &Digest, cache: &mut LoadCache) -> StoreResult<Arc<Commit>> {
        match self.load_with(digest, cache)? {
            GitObject::Commit(commit) => Ok(commit),
            other => Err(StoreError::CorruptObject {
                digest: digest.clone(),
                reason: format!("expected a commit, found a {}", other.kind()),
            }),
        }
    }

    /// Digest of the newest commit, or `None` before the first commit.
    pub fn head_digest(&self) -> StoreResult<Option<Digest>> {
        self.head.read(&self.backend)
    }

    /// The newest commit, or `None` before the first commit.
    pub fn head_commit(&self) -> StoreResult<Option<Arc<Commit>>> {
        match self.head_digest()? {
            Some(digest) => Ok(Some(self.load_commit(&digest, &mut LoadCache::new())?)),
            None => Ok(None),
        }
    }

    /// Root tree of the newest commit.
    pub fn head_tree(&self) -> StoreResult<Option<Arc<Tree>>> {
        Ok(self.head_commit()?.map(|commit| Arc::clone(commit.tree())))
    }

    /// Commit `tree` on top of the current head.
    ///
    /// Returns [`StoreError::HeadConflict`] if another writer advanced the
    /// head between reading it and updating it; the objects written remain
    /// stored and the caller may retry.
    pub fn commit<I, K, V>(
        &self,
        tree: impl Into<Arc<Tree>>,
        attributes: I,
        message: impl Into<String>,
    ) -> StoreResult<Arc<Commit>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let parent = self.head_digest()?;
        self.commit_onto(parent, tree, attributes, message)
    }

    /// Commit `tree` with `expected_parent` as parent, advancing the head
    /// only if it still points at `expected_parent`.
    pub fn commit_onto<I, K, V>(
        &self,
        expected_parent: Option<Digest>,
        tree: impl Into<Arc<Tree>>,
        attributes: I,
        message: impl Into<String>,
    ) -> StoreResult<Arc<Commit>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let commit = Arc::new(Commit::new(
            expected_parent.clone(),
            tree,
            attributes,
            message,
        )?);
        let digest = self.save(&GitObject::Commit(Arc::clone(&commit)))?;
        self.head
            .advance(&self.backend, expected_parent.as_ref(), &digest)?;
        Ok(commit)
    }

    /// Every commit reachable from head through parent links, newest first.
    ///
    /// All commits are loaded through one cache, so trees shared between
    /// commits are decoded once and are the same instance.
    pub fn history(&self) -> StoreResult<Vec<Arc<Commit>>> {
        let mut cache = LoadCache::new();
        let mut seen = HashSet::new();
        let mut commits = Vec::new();
        let mut next = self.head_digest()?;
        while let Some(digest) = next {
            if !seen.insert(digest.clone()) {
                return Err(StoreError::CorruptObject {
                    digest,
                    reason: "commit history contains a cycle".into(),
                });
            }
            let commit = self.load_commit(&digest, &mut cache)?;
            next = commit.parent().cloned();
            commits.push(commit);
        }
        Ok(commits)
    }
}

impl<B> std::fmt::Debug for ObjectStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Resolves tree and commit children from the backend while decoding.
struct Loader<'a, B> {
    store: &'a ObjectStore<B>,
    cache: &'a mut LoadCache,
}

impl<B: KvBackend> Resolver for Loader<'_, B> {
    type Error = StoreError;

    fn resolve(&mut self, kind: ObjectKind, digest: &Digest) -> StoreResult<GitObject> {
        let object = match self.store.load_with(digest, self.cache) {
            Err(StoreError::NotFound(digest)) => {
                return Err(ObjectError::Unresolved { kind, digest }.into())
            }
            result => result?,
        };
        if object.kind() != kind {
            return Err(ObjectError::Parse(format!(
                "{digest} is a {}, expected {kind}",
                object.kind()
            ))
            .into());
        }
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use gitkv_objects::{Blob, BlobKind, Fields, TreeBuilder};
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::fs::FsBackend;
    use crate::memory::InMemoryBackend;

    const NO_ATTRS: [(&str, &str); 0] = [];

    fn store() -> (Arc<InMemoryBackend>, ObjectStore<Arc<InMemoryBackend>>) {
        let backend = Arc::new(InMemoryBackend::new());
        let store = ObjectStore::new(Arc::clone(&backend), StoreConfig::default()).unwrap();
        (backend, store)
    }

    fn text(value: &str) -> Fields {
        Fields::new().with("text", value)
    }

    fn single_blob_tree() -> Tree {
        let mut builder = TreeBuilder::new();
        builder.create_blob("a.txt", text("hi")).unwrap();
        builder.build()
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        title: String,
        pinned: bool,
    }

    impl BlobKind for Note {
        const TAG: &'static str = "Note";
    }

    #[test]
    fn first_commit_has_no_parent() {
        let (_, store) = store();
        assert!(store.head_commit().unwrap().is_none());
        assert!(store.head_tree().unwrap().is_none());

        let commit = store.commit(single_blob_tree(), NO_ATTRS, "init").unwrap();
        assert!(commit.parent().is_none());

        let head = store.head_commit().unwrap().unwrap();
        assert_eq!(head.message(), "init");
        assert!(head.parent().is_none());
        let tree = store.head_tree().unwrap().unwrap();
        let blob = tree.get_child("a.txt").and_then(|n| n.as_blob()).unwrap();
        assert_eq!(
            blob.payload::<Fields>().and_then(|f| f.get("text")),
            Some(&serde_json::json!("hi"))
        );
    }

    #[test]
    fn same_tree_is_reused_across_commits() {
        let (backend, store) = store();
        let tree = Arc::new(single_blob_tree());

        let first = store.commit(Arc::clone(&tree), NO_ATTRS, "one").unwrap();
        // blob, tree, commit and head
        assert_eq!(backend.write_count(), 4);
        let second = store.commit(Arc::clone(&tree), NO_ATTRS, "two").unwrap();
        // commit and head only
        assert_eq!(backend.write_count(), 6);

        let algorithm = store.algorithm();
        assert_ne!(first.digest(algorithm), second.digest(algorithm));
        assert_eq!(first.tree().digest(algorithm), second.tree().digest(algorithm));
        assert_eq!(second.parent(), Some(&first.digest(algorithm)));
    }

    #[test]
    fn load_missing_is_not_found() {
        let (_, store) = store();
        let digest = store.algorithm().hash(b"never written");
        assert!(matches!(store.load(&digest), Err(StoreError::NotFound(d)) if d == digest));
    }

    #[test]
    fn second_save_writes_nothing() {
        let (backend, store) = store();
        let mut builder = TreeBuilder::new();
        builder.create_blob("a", text("1")).unwrap();
        builder.create_path("x/y").unwrap().create_blob("b", text("2")).unwrap();
        let tree = GitObject::from(builder.build());

        let digest = store.save(&tree).unwrap();
        let writes = backend.write_count();
        assert_eq!(writes, 5);
        assert_eq!(store.save(&tree).unwrap(), digest);
        assert_eq!(backend.write_count(), writes);
    }

    #[test]
    fn shared_subtree_is_stored_once() {
        let (backend, store) = store();
        let mut shared = TreeBuilder::new();
        shared.create_blob("lib.rs", text("fn main() {}")).unwrap();
        let shared = Arc::new(shared.build());

        let mut left = TreeBuilder::new();
        left.add_child("src", Arc::clone(&shared)).unwrap();
        left.create_blob("README", text("left")).unwrap();
        let mut right = TreeBuilder::new();
        right.add_child("src", Arc::clone(&shared)).unwrap();
        right.create_blob("README", text("right")).unwrap();

        store.save(&GitObject::from(left.build())).unwrap();
        let after_left = backend.len();
        store.save(&GitObject::from(right.build())).unwrap();
        // new README blob and new root only
        assert_eq!(backend.len(), after_left + 2);
        assert!(store.contains(&shared.digest(store.algorithm())).unwrap());
    }

    #[test]
    fn load_roundtrip_shares_repeated_children() {
        let (_, store) = store();
        let blob = Arc::new(Blob::new(text("same")).unwrap());
        let mut builder = TreeBuilder::new();
        builder.add_child("one", Arc::clone(&blob)).unwrap();
        builder.add_child("two", Arc::clone(&blob)).unwrap();
        let tree = builder.build();
        let digest = store.save(&GitObject::from(tree.clone())).unwrap();

        let loaded = store.load(&digest).unwrap();
        let loaded = loaded.as_tree().unwrap();
        assert_eq!(**loaded, tree);
        let one = loaded.get_child("one").unwrap();
        let two = loaded.get_child("two").unwrap();
        assert!(one.ptr_eq(two));
    }

    #[test]
    fn load_cache_spans_calls() {
        let (_, store) = store();
        let digest = store.save(&GitObject::from(single_blob_tree())).unwrap();
        let mut cache = LoadCache::new();
        let a = store.load_with(&digest, &mut cache).unwrap();
        assert_eq!(cache.len(), 2);
        let b = store.load_with(&digest, &mut cache).unwrap();
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn missing_child_is_unresolved() {
        let (backend, store) = store();
        let tree = GitObject::from(single_blob_tree());
        let digest = tree.digest(store.algorithm());
        backend
            .set(digest.as_str(), &tree.file_contents(store.algorithm()))
            .unwrap();

        let err = store.load(&digest).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Object(ObjectError::Unresolved {
                kind: ObjectKind::Blob,
                ..
            })
        ));
    }

    #[test]
    fn tampered_contents_fail_verification() {
        let (backend, store) = store();
        let blob = GitObject::from(Blob::new(text("real")).unwrap());
        let forged = store.algorithm().hash(b"elsewhere");
        backend
            .set(forged.as_str(), &blob.file_contents(store.algorithm()))
            .unwrap();
        assert!(matches!(
            store.load(&forged),
            Err(StoreError::HashMismatch { .. })
        ));

        let config = StoreConfig {
            verify_on_load: false,
            ..StoreConfig::default()
        };
        let lenient = ObjectStore::new(Arc::clone(&backend), config).unwrap();
        assert_eq!(lenient.load(&forged).unwrap(), blob);
    }

    #[test]
    fn malformed_contents_are_parse_errors() {
        let (backend, store) = store();
        let contents = b"blob 99\0short";
        let digest = store.algorithm().hash(contents);
        backend.set(digest.as_str(), contents).unwrap();
        assert!(matches!(
            store.load(&digest),
            Err(StoreError::Object(ObjectError::Parse(_)))
        ));
    }

    #[test]
    fn externally_encoded_commit_keeps_its_digest() {
        let (backend, store) = store();
        let algorithm = store.algorithm();
        let tree = store.save(&GitObject::from(single_blob_tree())).unwrap();
        let body = format!("tree {tree}\ntimestamp 1\nauthor me\n\nmsg");
        let contents = format!("commit {}\0{body}", body.len());
        let digest = algorithm.hash(contents.as_bytes());
        backend.set(digest.as_str(), contents.as_bytes()).unwrap();

        let loaded = store.load(&digest).unwrap();
        assert_eq!(loaded.digest(algorithm), digest);
        let writes = backend.write_count();
        assert_eq!(store.save(&loaded).unwrap(), digest);
        assert_eq!(backend.write_count(), writes);
    }

    #[test]
    fn non_canonical_bodies_are_rejected() {
        let (backend, store) = store();
        let algorithm = store.algorithm();
        let blob = GitObject::from(Blob::new(text("x")).unwrap());
        let blob_digest = store.save(&blob).unwrap();
        let upper = blob_digest.as_str().to_ascii_uppercase();
        let tree_body = format!("100644 blob {upper} x");
        let body = blob.encode(algorithm);

        let mut padded = format!("blob 0{}\0", body.len()).into_bytes();
        padded.extend_from_slice(&body);
        let cases = [
            format!("tree {}\0{tree_body}", tree_body.len()).into_bytes(),
            padded,
        ];
        for contents in cases {
            let digest = algorithm.hash(&contents);
            backend.set(digest.as_str(), &contents).unwrap();
            assert!(matches!(
                store.load(&digest),
                Err(StoreError::Object(ObjectError::Parse(_)))
            ));
        }
    }

    #[test]
    fn history_is_linear() {
        let (_, store) = store();
        for i in 0..5 {
            let mut builder = TreeBuilder::new();
            builder.create_blob("n", text(&i.to_string())).unwrap();
            store
                .commit(builder.build(), [("seq", i.to_string())], format!("commit {i}"))
                .unwrap();
        }

        let history = store.history().unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].message(), "commit 4");
        assert!(history[4].is_root());
        assert!(history[..4].iter().all(|c| !c.is_root()));
        for pair in history.windows(2) {
            assert_eq!(pair[0].parent(), Some(&pair[1].digest(store.algorithm())));
        }
    }

    #[test]
    fn stale_parent_conflicts() {
        let (_, store) = store();
        let first = store.commit(single_blob_tree(), NO_ATTRS, "first").unwrap();
        let first_digest = first.digest(store.algorithm());

        store
            .commit_onto(Some(first_digest.clone()), Tree::empty(), NO_ATTRS, "winner")
            .unwrap();
        let winner = store.head_digest().unwrap();

        let err = store
            .commit_onto(Some(first_digest.clone()), Tree::empty(), NO_ATTRS, "loser")
            .unwrap_err();
        match err {
            StoreError::HeadConflict { expected, actual } => {
                assert_eq!(expected, Some(first_digest));
                assert_eq!(actual, winner);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.head_commit().unwrap().unwrap().message(), "winner");
        assert_eq!(store.history().unwrap().len(), 2);
    }

    #[test]
    fn head_pointing_at_tree_is_corrupt() {
        let (backend, store) = store();
        let digest = store.save(&GitObject::from(single_blob_tree())).unwrap();
        backend.set("refs/heads/master", digest.as_str().as_bytes()).unwrap();
        assert!(matches!(
            store.head_commit(),
            Err(StoreError::CorruptObject { .. })
        ));
    }

    #[test]
    fn registered_kind_roundtrip() {
        let (backend, mut store) = store();
        store.registry_mut().register_kind::<Note>();

        let mut builder = TreeBuilder::new();
        builder
            .create_blob(
                "todo",
                Note {
                    title: "buy milk".into(),
                    pinned: true,
                },
            )
            .unwrap();
        store.commit(builder.build(), NO_ATTRS, "notes").unwrap();

        let tree = store.head_tree().unwrap().unwrap();
        let blob = tree.get_path("todo").and_then(|n| n.as_blob()).unwrap();
        assert_eq!(blob.tag(), "Note");
        assert_eq!(
            blob.payload::<Note>(),
            Some(&Note {
                title: "buy milk".into(),
                pinned: true
            })
        );

        let unaware = ObjectStore::new(backend, StoreConfig::default()).unwrap();
        assert!(matches!(
            unaware.head_commit(),
            Err(StoreError::Object(ObjectError::UnknownKind(tag))) if tag == "Note"
        ));
    }

    #[test]
    fn edit_then_commit_keeps_unchanged_subtrees() {
        let (backend, store) = store();
        let mut builder = TreeBuilder::new();
        builder.create_path("docs").unwrap().create_blob("a.md", text("a")).unwrap();
        builder.create_path("src").unwrap().create_blob("b.rs", text("b")).unwrap();
        let first = store.commit(builder.build(), NO_ATTRS, "first").unwrap();

        let mut next = first.edit_tree();
        next.create_path("src")
            .unwrap()
            .replace_child("b.rs", Blob::new(text("b2")).unwrap())
            .unwrap();
        let writes = backend.write_count();
        let second = store.commit(next.build(), NO_ATTRS, "second").unwrap();
        // new blob, src, root, commit and head
        assert_eq!(backend.write_count(), writes + 5);

        let algorithm = store.algorithm();
        let docs = |c: &Commit| c.tree().get_child("docs").unwrap().digest(algorithm);
        assert_eq!(docs(first.as_ref()), docs(second.as_ref()));
    }

    #[test]
    fn directory_backend_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store =
                ObjectStore::new(FsBackend::open(dir.path()).unwrap(), StoreConfig::default())
                    .unwrap();
            store.commit(single_blob_tree(), [("author", "Ada Lovelace")], "init").unwrap();
            store.commit(single_blob_tree(), NO_ATTRS, "again").unwrap();
        }

        let store =
            ObjectStore::new(FsBackend::open(dir.path()).unwrap(), StoreConfig::default()).unwrap();
        let history = store.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].attribute("author"), Some("Ada Lovelace"));
        assert!(Arc::ptr_eq(history[0].tree(), history[1].tree()));
    }

    #[test]
    fn blake3_store_uses_long_digests() {
        let config = StoreConfig::default()
            .with_digest(DigestAlgorithm::Blake3)
            .with_head_ref("refs/heads/main");
        let store = ObjectStore::new(InMemoryBackend::new(), config).unwrap();
        store.commit(single_blob_tree(), NO_ATTRS, "init").unwrap();
        let head = store.head_digest().unwrap().unwrap();
        assert_eq!(head.as_str().len(), 64);
        assert!(store.backend().has("refs/heads/main").unwrap());
        assert_eq!(store.head_commit().unwrap().unwrap().message(), "init");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = StoreConfig::default().with_head_ref("HEAD");
        assert!(matches!(
            ObjectStore::new(InMemoryBackend::new(), config),
            Err(StoreError::Config(_))
        ));
    }

    proptest! {
        #[test]
        fn saved_blobs_load_back(values in proptest::collection::vec(".*", 1..8)) {
            let (backend, store) = store();
            let mut builder = TreeBuilder::new();
            for (i, value) in values.iter().enumerate() {
                builder.create_blob(format!("f{i}"), text(value)).unwrap();
            }
            let tree = builder.build();
            let digest = store.save(&GitObject::from(tree.clone())).unwrap();
            let writes = backend.write_count();
            prop_assert_eq!(store.save(&GitObject::from(tree.clone())).unwrap(), digest.clone());
            prop_assert_eq!(backend.write_count(), writes);

            let loaded = store.load(&digest).unwrap();
            prop_assert_eq!(loaded.as_tree().map(|t| (**t).clone()), Some(tree));
        }
    }
}
