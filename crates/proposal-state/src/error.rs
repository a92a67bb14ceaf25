//! # Lifecycle Errors
//!
//! One taxonomy for every failure the lifecycle can report, from pure
//! validation through persistence. Business conditions are values, never
//! panics.
//!
//! | Category | Variants | Caller action |
//! |---|---|---|
//! | Validation | `InvalidTransition`, `CloneNotPermitted`, `AlreadyImmutable`, `MissingField` | fix input |
//! | Conflict | `ConcurrentModification` | re-read, decide |
//! | Not found | `NotFound` | abort request |
//! | Persistence | `Persistence` | abort request |
//! | Integrity | `Integrity` | report, investigate |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use proposal_core::{CanonicalizationError, DocumentId, IntegrityViolation};

use crate::status::DocumentStatus;
use crate::versioning::ClonePolicy;

/// Machine-readable error codes exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidTransition,
    AlreadyImmutable,
    MissingField,
    NotFound,
    Conflict,
    PersistenceFailure,
    IntegrityViolation,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::AlreadyImmutable => "ALREADY_IMMUTABLE",
            Self::MissingField => "MISSING_FIELD",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::PersistenceFailure => "PERSISTENCE_FAILURE",
            Self::IntegrityViolation => "INTEGRITY_VIOLATION",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur anywhere in the proposal lifecycle.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The move is not in the transition table (or needs the sign flow).
    #[error("invalid transition from {from} to {to}{}", reason_suffix(.reason))]
    InvalidTransition {
        from: DocumentStatus,
        to: DocumentStatus,
        reason: Option<String>,
    },

    /// The document is SIGNED or CLOSED and cannot be mutated or re-signed.
    #[error("document is {status} and immutable; clone it to create an editable version")]
    AlreadyImmutable { status: DocumentStatus },

    /// The configured clone policy refuses this source status.
    #[error("clone policy '{policy}' does not permit cloning a {status} document")]
    CloneNotPermitted {
        status: DocumentStatus,
        policy: ClonePolicy,
    },

    /// A required input field was empty or absent.
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    /// The referenced document does not exist.
    #[error("document {document_id} not found")]
    NotFound { document_id: DocumentId },

    /// A conditional write matched zero rows: another writer won the race.
    #[error("document {document_id} was modified concurrently (expected status {expected})")]
    ConcurrentModification {
        document_id: DocumentId,
        expected: DocumentStatus,
    },

    /// Storage unavailable or transaction aborted.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Recomputed hash differs from the stored fingerprint.
    #[error(transparent)]
    Integrity(#[from] IntegrityViolation),

    /// Content could not be canonicalized for hashing.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default()
}

impl LifecycleError {
    /// The wire-level error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidTransition { .. } | Self::CloneNotPermitted { .. } => {
                ErrorCode::InvalidTransition
            }
            Self::AlreadyImmutable { .. } => ErrorCode::AlreadyImmutable,
            Self::MissingField { .. } => ErrorCode::MissingField,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::ConcurrentModification { .. } => ErrorCode::Conflict,
            Self::Persistence(_) | Self::Canonicalization(_) => ErrorCode::PersistenceFailure,
            Self::Integrity(_) => ErrorCode::IntegrityViolation,
        }
    }

    /// Only a lost race is worth a caller-driven retry; nothing retries
    /// automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}
