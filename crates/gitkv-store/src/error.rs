use gitkv_objects::ObjectError;
use gitkv_types::Digest;

/// Errors raised by a key-value backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// The key cannot be mapped onto this backend.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(Digest),

    /// Encoding, decoding or model validation failed.
    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// The head moved between reading it and advancing it.
    #[error("head conflict: expected {}, found {}", display_head(.expected), display_head(.actual))]
    HeadConflict {
        expected: Option<Digest>,
        actual: Option<Digest>,
    },

    /// The head ref holds something other than a commit digest.
    #[error("corrupt head ref {name}: {reason}")]
    CorruptHead { name: String, reason: String },

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch for {expected}: computed {computed}")]
    HashMismatch { expected: Digest, computed: Digest },

    /// The stored graph is inconsistent.
    #[error("corrupt object {digest}: {reason}")]
    CorruptObject { digest: Digest, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

fn display_head(head: &Option<Digest>) -> String {
    match head {
        Some(digest) => digest.to_string(),
        None => "no commit".to_string(),
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
