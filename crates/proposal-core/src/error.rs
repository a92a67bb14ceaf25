//! # Error Types
//!
//! Leaf error types shared by every crate that hashes or verifies document
//! content. All errors use `thiserror` for derive-based `Display` and
//! `Error` implementations.

use thiserror::Error;

use crate::digest::ContentDigest;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON conversion or JCS serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// A digest string could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestParseError {
    /// SHA-256 hex digests are exactly 64 characters.
    #[error("digest must be 64 hex characters, got {0}")]
    InvalidLength(usize),

    /// A character pair was not valid hex.
    #[error("invalid hex in digest: {0:?}")]
    InvalidHex(String),
}

/// Recomputed content hash differs from the stored fingerprint.
///
/// This is never auto-repaired. Callers report it and flag the document
/// for investigation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("integrity violation: stored hash {expected} but content hashes to {actual}")]
pub struct IntegrityViolation {
    /// The fingerprint recorded at signing time.
    pub expected: ContentDigest,
    /// The fingerprint of the content as it exists now.
    pub actual: ContentDigest,
}
