use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::backend::{KvBackend, Swap};
use crate::error::{BackendError, BackendResult};

/// In-memory, HashMap-based backend.
///
/// Intended for tests and embedding. Values are cloned on read and write.
/// Every successful write is counted, so callers can check that saving an
/// already-stored graph writes nothing.
pub struct InMemoryBackend {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl InMemoryBackend {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total writes performed, including successful swaps.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let map = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> BackendError {
    BackendError::LockPoisoned(e.to_string())
}

impl KvBackend for InMemoryBackend {
    fn has(&self, key: &str) -> BackendResult<bool> {
        let map = self.entries.read().map_err(poisoned)?;
        Ok(map.contains_key(key))
    }

    fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        let map = self.entries.read().map_err(poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> BackendResult<()> {
        let mut map = self.entries.write().map_err(poisoned)?;
        map.insert(key.to_string(), value.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> BackendResult<Swap> {
        let mut map = self.entries.write().map_err(poisoned)?;
        let current = map.get(key).map(Vec::as_slice);
        if current != expected {
            return Ok(Swap::Mismatch {
                actual: current.map(<[u8]>::to_vec),
            });
        }
        map.insert(key.to_string(), value.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(Swap::Swapped)
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("key_count", &self.len())
            .field("write_count", &self.write_count())
            .finish()
    }
}
