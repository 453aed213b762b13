//! Foundation types for gitkv.
//!
//! Every other gitkv crate depends on `gitkv-types`.
//!
//! # Key Types
//!
//! - [`Digest`] -- Content-addressed identifier (lowercase hex)
//! - [`DigestAlgorithm`] -- The hash function objects are keyed by

pub mod algorithm;
pub mod digest;
pub mod error;

pub use algorithm::DigestAlgorithm;
pub use digest::Digest;
pub use error::TypeError;
