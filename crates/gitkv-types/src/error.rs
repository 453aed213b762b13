use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid digest length: expected 20 or 32 bytes, got {actual}")]
    InvalidLength { actual: usize },

    /// Hex text that is valid but not in canonical lowercase form.
    #[error("digest is not lowercase hex: {0}")]
    NotCanonical(String),

    #[error("unknown digest algorithm: {0}")]
    UnknownAlgorithm(String),
}
