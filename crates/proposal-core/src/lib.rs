//! # proposal-core: Foundational Types for the Proposal Lifecycle
//!
//! This crate is the leaf of the workspace DAG. It defines the primitives
//! every other crate relies on to make integrity claims about a proposal
//! document.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** ALL document hashing flows through
//!    `CanonicalBytes::new()`. No raw `serde_json::to_vec()` for digests.
//!    Two logically equal documents always produce the same bytes, no
//!    matter how their fields were inserted.
//!
//! 2. **`sha256_digest()` accepts only `&CanonicalBytes`.** Compile-time
//!    enforcement that every digest path goes through canonicalization.
//!
//! 3. **Newtype identifiers.** `DocumentId` and `AuditRecordId` are distinct
//!    types; an audit record id cannot be passed where a document id is
//!    expected.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `proposal-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_hex, ContentDigest};
pub use error::{CanonicalizationError, DigestParseError, IntegrityViolation};
pub use identity::{AuditRecordId, DocumentId};
