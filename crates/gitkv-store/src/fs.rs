//! Directory-backed key-value storage.
//!
//! Every key is one file below the root. Object keys (digest hex) fan out
//! into `objects/<first two chars>/<rest>`; any other key, such as a ref
//! name, maps onto its `/`-separated path.
//!
//! Writes land in a temporary file in the destination directory and are
//! renamed into place, so a reader never observes a partial value.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::backend::{KvBackend, Swap};
use crate::error::{BackendError, BackendResult};

const OBJECTS_DIR: &str = "objects";

/// A [`KvBackend`] storing one file per key under a root directory.
///
/// Compare-and-swap is serialized by an in-process mutex; two processes
/// sharing the same directory are not coordinated.
#[derive(Debug)]
pub struct FsBackend {
    root: PathBuf,
    swap_lock: Mutex<()>,
}

impl FsBackend {
    /// Open (creating if needed) a backend rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> BackendResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened directory backend");
        Ok(Self {
            root,
            swap_lock: Mutex::new(()),
        })
    }

    /// Directory all keys are stored under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file a key is stored in.
    pub fn path_for(&self, key: &str) -> BackendResult<PathBuf> {
        if is_object_key(key) {
            let (fan, rest) = key.split_at(2);
            return Ok(self.root.join(OBJECTS_DIR).join(fan).join(rest));
        }

        let invalid = |reason: &str| BackendError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        if key.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if key.contains('\\') || key.contains('\0') {
            return Err(invalid("must not contain a backslash or NUL"));
        }
        let mut path = self.root.clone();
        for (i, component) in key.split('/').enumerate() {
            match component {
                "" => return Err(invalid("path components must not be empty")),
                "." | ".." => return Err(invalid("path components must not be '.' or '..'")),
                OBJECTS_DIR if i == 0 => return Err(invalid("'objects' is reserved")),
                _ => path.push(component),
            }
        }
        Ok(path)
    }

    fn read_path(path: &Path) -> BackendResult<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_path(path: &Path, value: &[u8]) -> BackendResult<()> {
        let dir = path.parent().ok_or_else(|| {
            BackendError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no parent directory", path.display()),
            ))
        })?;
        fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(value)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| BackendError::Io(e.error))?;
        Ok(())
    }
}

fn is_object_key(key: &str) -> bool {
    matches!(key.len(), 40 | 64) && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

impl KvBackend for FsBackend {
    fn has(&self, key: &str) -> BackendResult<bool> {
        match fs::metadata(self.path_for(key)?) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        Self::read_path(&self.path_for(key)?)
    }

    fn set(&self, key: &str, value: &[u8]) -> BackendResult<()> {
        let path = self.path_for(key)?;
        Self::write_path(&path, value)?;
        debug!(key, bytes = value.len(), "wrote key");
        Ok(())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> BackendResult<Swap> {
        let path = self.path_for(key)?;
        let _guard = self
            .swap_lock
            .lock()
            .map_err(|e| BackendError::LockPoisoned(e.to_string()))?;
        let current = Self::read_path(&path)?;
        if current.as_deref() != expected {
            return Ok(Swap::Mismatch { actual: current });
        }
        Self::write_path(&path, value)?;
        Ok(Swap::Swapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "a1e4a80ce4834a15307b72281e55d23c91487f7b";

    fn backend() -> (tempfile::TempDir, FsBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::open(dir.path().join("store")).unwrap();
        (dir, backend)
    }

    #[test]
    fn set_get_has() {
        let (_dir, backend) = backend();
        assert!(!backend.has(DIGEST).unwrap());
        assert_eq!(backend.get(DIGEST).unwrap(), None);
        backend.set(DIGEST, b"blob 0\0").unwrap();
        assert!(backend.has(DIGEST).unwrap());
        assert_eq!(backend.get(DIGEST).unwrap(), Some(b"blob 0\0".to_vec()));
    }

    #[test]
    fn object_keys_fan_out() {
        let (_dir, backend) = backend();
        let path = backend.path_for(DIGEST).unwrap();
        assert_eq!(
            path,
            backend.root().join("objects").join("a1").join(&DIGEST[2..])
        );
    }

    #[test]
    fn ref_keys_map_to_nested_paths() {
        let (_dir, backend) = backend();
        backend.set("refs/heads/master", DIGEST.as_bytes()).unwrap();
        let on_disk = fs::read(backend.root().join("refs").join("heads").join("master")).unwrap();
        assert_eq!(on_disk, DIGEST.as_bytes());
    }

    #[test]
    fn overwrite_replaces_value() {
        let (_dir, backend) = backend();
        backend.set("refs/heads/master", b"one").unwrap();
        backend.set("refs/heads/master", b"two").unwrap();
        assert_eq!(backend.get("refs/heads/master").unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn rejects_unsafe_keys() {
        let (_dir, backend) = backend();
        for key in ["", "../escape", "refs//x", "refs/./x", "a\\b", "/abs", "objects/x", "nul\0"] {
            let err = backend.set(key, b"x").unwrap_err();
            assert!(matches!(err, BackendError::InvalidKey { .. }), "{key:?}");
        }
    }

    #[test]
    fn compare_and_swap_on_disk() {
        let (_dir, backend) = backend();
        let key = "refs/heads/master";
        assert!(backend.compare_and_swap(key, None, b"a").unwrap().is_swapped());
        assert_eq!(
            backend.compare_and_swap(key, None, b"b").unwrap(),
            Swap::Mismatch {
                actual: Some(b"a".to_vec())
            }
        );
        assert!(backend
            .compare_and_swap(key, Some(b"a".as_slice()), b"b")
            .unwrap()
            .is_swapped());
        assert_eq!(backend.get(key).unwrap(), Some(b"b".to_vec()));
    }

    #[test]
    fn reopen_sees_existing_data() {
        let dir = tempfile::tempdir().unwrap();
        FsBackend::open(dir.path()).unwrap().set(DIGEST, b"x").unwrap();
        let reopened = FsBackend::open(dir.path()).unwrap();
        assert_eq!(reopened.get(DIGEST).unwrap(), Some(b"x".to_vec()));
    }
}
