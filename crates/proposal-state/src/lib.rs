//! # proposal-state: Proposal Lifecycle Rules
//!
//! Everything that decides what may happen to a proposal document, with no
//! I/O of its own:
//!
//! - **Transition Table** (`status.rs`): the fixed adjacency of legal status
//!   moves, immutability, and the capability summary derived from it.
//!
//! - **Typestate lifecycle** (`lifecycle.rs`): `Proposal<S>` with one marker
//!   type per status. Content setters exist only on editable states.
//!
//! - **Signature Coordinator** (`signature.rs`): validates a sign request and
//!   yields the lock and audit payloads the caller persists atomically.
//!
//! - **Version Cloner** (`versioning.rs`): builds the successor draft of a
//!   document with lineage and version metadata.
//!
//! - **Integrity** (`integrity.rs`): hash verification of a single document
//!   and the reconciliation sweep over a store snapshot.
//!
//! Persistence, transport and the clock belong to the caller.

pub mod document;
pub mod error;
pub mod integrity;
pub mod lifecycle;
pub mod signature;
pub mod status;
pub mod versioning;

pub use document::{
    AuthMethod, Document, DocumentContent, FinancialSnapshot, SignatureAuditRecord, SignerRole,
};
pub use error::{ErrorCode, LifecycleError};
pub use integrity::{
    reconcile, verify_content_hash, verify_document, FindingKind, IntegrityReport,
    IntegrityVerdict, ReconciliationFinding,
};
pub use lifecycle::{AnyProposal, EditableProposal, LockedProposal, Proposal, ProposalView};
pub use signature::{
    prepare_signature, AuditPayload, LockPayload, PreparedSignature, SignatureError,
    SignerPayload,
};
pub use status::{can_transition, is_immutable, plan_transition, Capabilities, DocumentStatus};
pub use versioning::{prepare_clone, versioned_title, ClonePolicy, ClonedDocumentDraft};
