use std::sync::Arc;

use crate::error::BackendResult;

/// Outcome of [`KvBackend::compare_and_swap`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Swap {
    /// The expected value matched and the new value was written.
    Swapped,
    /// The stored value differed; nothing was written.
    Mismatch { actual: Option<Vec<u8>> },
}

impl Swap {
    /// Whether the new value was written.
    pub fn is_swapped(&self) -> bool {
        matches!(self, Self::Swapped)
    }
}

/// A flat byte-valued key space.
///
/// Objects are stored under their digest hex; the head lives under its ref
/// name. Implementations must be safe for concurrent use.
pub trait KvBackend: Send + Sync {
    fn has(&self, key: &str) -> BackendResult<bool>;

    fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: &[u8]) -> BackendResult<()>;

    /// Write `value` only if the key currently holds `expected`
    /// (`None` meaning absent). Atomic with respect to other callers.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> BackendResult<Swap>;
}

impl<B: KvBackend + ?Sized> KvBackend for Arc<B> {
    fn has(&self, key: &str) -> BackendResult<bool> {
        (**self).has(key)
    }

    fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> BackendResult<()> {
        (**self).set(key, value)
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> BackendResult<Swap> {
        (**self).compare_and_swap(key, expected, value)
    }
}
