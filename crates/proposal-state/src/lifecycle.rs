//! # Proposal Typestate Machine
//!
//! Wraps a persisted [`Document`] in a type that encodes its lifecycle
//! status. Content mutation exists only on editable states, so an attempt to
//! edit a signed or closed proposal is a compile error rather than a runtime
//! check scattered through handlers.
//!
//! ## Allowed Transitions
//!
//! ```text
//! Draft ──submit()──▶ PendingReview ──approve()──▶ Approved ──sign()──▶ Signed ──close()──▶ Closed
//!   ▲                      │                          │
//!   └──return_to_draft()───┴──────────────────────────┘
//!   ▲
//!   └──reopen()── Cancelled ◀──cancel()── Draft | PendingReview | Approved
//! ```
//!
//! ## Compile-Time Safety Example
//!
//! A signed proposal exposes no content setter:
//!
//! ```compile_fail
//! use proposal_state::lifecycle::{Proposal, Signed};
//! use proposal_state::DocumentContent;
//!
//! fn tamper(proposal: &mut Proposal<Signed>, content: DocumentContent) {
//!     // ERROR: no method named `replace_content` found for `Proposal<Signed>`
//!     proposal.replace_content(content, chrono::Utc::now());
//! }
//! ```
//!
//! Documents loaded from storage have no compile-time status; use
//! [`AnyProposal::from_document`] and either [`AnyProposal::transition`] or
//! [`AnyProposal::split`] to get back into the typed world.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};

use proposal_core::{ContentDigest, DocumentId};

use crate::document::{Document, DocumentContent};
use crate::error::LifecycleError;
use crate::signature::LockPayload;
use crate::status::{plan_transition, DocumentStatus};

// ─── State Types ─────────────────────────────────────────────────────

/// Proposal state: freely editable draft.
#[derive(Debug, Clone, Copy)]
pub struct Draft;

/// Proposal state: submitted for internal review.
#[derive(Debug, Clone, Copy)]
pub struct PendingReview;

/// Proposal state: approved and awaiting signature.
#[derive(Debug, Clone, Copy)]
pub struct Approved;

/// Proposal state: signed and locked.
#[derive(Debug, Clone, Copy)]
pub struct Signed;

/// Proposal state: administratively closed (terminal).
#[derive(Debug, Clone, Copy)]
pub struct Closed;

/// Proposal state: abandoned, may be reopened.
#[derive(Debug, Clone, Copy)]
pub struct Cancelled;

mod private {
    pub trait Sealed {}
    impl Sealed for super::Draft {}
    impl Sealed for super::PendingReview {}
    impl Sealed for super::Approved {}
    impl Sealed for super::Signed {}
    impl Sealed for super::Closed {}
    impl Sealed for super::Cancelled {}
}

/// Marker trait for the six lifecycle states. Sealed.
pub trait LifecycleState: private::Sealed + std::fmt::Debug {
    /// The runtime status this marker stands for.
    const STATUS: DocumentStatus;
}

/// States whose content may still change.
pub trait Editable: LifecycleState {}

/// States with an outgoing move to `CANCELLED`.
pub trait Cancellable: LifecycleState {}

/// States with an outgoing move back to `DRAFT`.
pub trait Reopenable: LifecycleState {}

impl LifecycleState for Draft {
    const STATUS: DocumentStatus = DocumentStatus::Draft;
}
impl LifecycleState for PendingReview {
    const STATUS: DocumentStatus = DocumentStatus::PendingReview;
}
impl LifecycleState for Approved {
    const STATUS: DocumentStatus = DocumentStatus::Approved;
}
impl LifecycleState for Signed {
    const STATUS: DocumentStatus = DocumentStatus::Signed;
}
impl LifecycleState for Closed {
    const STATUS: DocumentStatus = DocumentStatus::Closed;
}
impl LifecycleState for Cancelled {
    const STATUS: DocumentStatus = DocumentStatus::Cancelled;
}

impl Editable for Draft {}
impl Editable for PendingReview {}
impl Editable for Approved {}
impl Editable for Cancelled {}

impl Cancellable for Draft {}
impl Cancellable for PendingReview {}
impl Cancellable for Approved {}

impl Reopenable for PendingReview {}
impl Reopenable for Approved {}
impl Reopenable for Cancelled {}

// ─── The Proposal ────────────────────────────────────────────────────

/// A proposal document parameterized by its lifecycle state.
#[derive(Debug, Clone)]
pub struct Proposal<S: LifecycleState> {
    document: Document,
    _state: PhantomData<S>,
}

impl<S: LifecycleState> Proposal<S> {
    fn wrap(document: Document) -> Self {
        Self {
            document,
            _state: PhantomData,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.document.id
    }

    pub fn status(&self) -> DocumentStatus {
        S::STATUS
    }

    pub fn content(&self) -> &DocumentContent {
        &self.document.content
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    fn transition_to<T: LifecycleState>(mut self, now: DateTime<Utc>) -> Proposal<T> {
        self.document.status = T::STATUS;
        self.document.updated_at = now;
        Proposal::wrap(self.document)
    }
}

impl<S: Editable> Proposal<S> {
    /// Replace the hashed content. Not available once signed.
    pub fn replace_content(&mut self, content: DocumentContent, now: DateTime<Utc>) {
        self.document.content = content;
        self.document.updated_at = now;
    }
}

impl<S: Cancellable> Proposal<S> {
    pub fn cancel(self, now: DateTime<Utc>) -> Proposal<Cancelled> {
        self.transition_to(now)
    }
}

impl<S: Reopenable> Proposal<S> {
    /// Send the proposal back to `DRAFT` for rework.
    pub fn return_to_draft(self, now: DateTime<Utc>) -> Proposal<Draft> {
        self.transition_to(now)
    }
}

impl Proposal<Draft> {
    /// Start a new version-1 draft.
    pub fn new(content: DocumentContent, now: DateTime<Utc>) -> Self {
        Self::wrap(Document::new_draft(content, now))
    }

    pub fn submit(self, now: DateTime<Utc>) -> Proposal<PendingReview> {
        self.transition_to(now)
    }
}

impl Proposal<PendingReview> {
    pub fn approve(self, now: DateTime<Utc>) -> Proposal<Approved> {
        self.transition_to(now)
    }
}

impl Proposal<Approved> {
    /// Apply a prepared lock. The only way into `SIGNED`.
    pub fn sign(mut self, lock: &LockPayload) -> Proposal<Signed> {
        self.document.locked_at = Some(lock.locked_at);
        self.document.document_hash = Some(lock.document_hash);
        self.transition_to(lock.locked_at)
    }
}

impl Proposal<Signed> {
    pub fn close(self, now: DateTime<Utc>) -> Proposal<Closed> {
        self.transition_to(now)
    }
}

// ─── AnyProposal: runtime status for persisted documents ───────────

/// A proposal whose status is only known at runtime.
#[derive(Debug, Clone)]
pub enum AnyProposal {
    Draft(Proposal<Draft>),
    PendingReview(Proposal<PendingReview>),
    Approved(Proposal<Approved>),
    Signed(Proposal<Signed>),
    Closed(Proposal<Closed>),
    Cancelled(Proposal<Cancelled>),
}

impl AnyProposal {
    /// Lift a stored document into the typed world by its `status` field.
    pub fn from_document(document: Document) -> Self {
        match document.status {
            DocumentStatus::Draft => Self::Draft(Proposal::wrap(document)),
            DocumentStatus::PendingReview => Self::PendingReview(Proposal::wrap(document)),
            DocumentStatus::Approved => Self::Approved(Proposal::wrap(document)),
            DocumentStatus::Signed => Self::Signed(Proposal::wrap(document)),
            DocumentStatus::Closed => Self::Closed(Proposal::wrap(document)),
            DocumentStatus::Cancelled => Self::Cancelled(Proposal::wrap(document)),
        }
    }

    pub fn document(&self) -> &Document {
        match self {
            Self::Draft(p) => p.document(),
            Self::PendingReview(p) => p.document(),
            Self::Approved(p) => p.document(),
            Self::Signed(p) => p.document(),
            Self::Closed(p) => p.document(),
            Self::Cancelled(p) => p.document(),
        }
    }

    pub fn into_document(self) -> Document {
        match self {
            Self::Draft(p) => p.into_document(),
            Self::PendingReview(p) => p.into_document(),
            Self::Approved(p) => p.into_document(),
            Self::Signed(p) => p.into_document(),
            Self::Closed(p) => p.into_document(),
            Self::Cancelled(p) => p.into_document(),
        }
    }

    pub fn status(&self) -> DocumentStatus {
        self.document().status
    }

    /// Apply a simple (non-signing) transition with runtime validation.
    ///
    /// The move is checked against the transition table before anything is
    /// touched; `SIGNED` is refused here and must go through [`Self::sign`].
    pub fn transition(
        self,
        target: DocumentStatus,
        now: DateTime<Utc>,
    ) -> Result<Self, LifecycleError> {
        let current = self.status();
        plan_transition(current, target)?;

        let next = match (self, target) {
            (Self::Draft(p), DocumentStatus::PendingReview) => Self::PendingReview(p.submit(now)),
            (Self::Draft(p), DocumentStatus::Cancelled) => Self::Cancelled(p.cancel(now)),
            (Self::PendingReview(p), DocumentStatus::Approved) => Self::Approved(p.approve(now)),
            (Self::PendingReview(p), DocumentStatus::Draft) => {
                Self::Draft(p.return_to_draft(now))
            }
            (Self::PendingReview(p), DocumentStatus::Cancelled) => Self::Cancelled(p.cancel(now)),
            (Self::Approved(p), DocumentStatus::Draft) => Self::Draft(p.return_to_draft(now)),
            (Self::Approved(p), DocumentStatus::Cancelled) => Self::Cancelled(p.cancel(now)),
            (Self::Signed(p), DocumentStatus::Closed) => Self::Closed(p.close(now)),
            (Self::Cancelled(p), DocumentStatus::Draft) => Self::Draft(p.return_to_draft(now)),
            (_, to) => {
                return Err(LifecycleError::InvalidTransition {
                    from: current,
                    to,
                    reason: None,
                })
            }
        };
        Ok(next)
    }

    /// Apply a prepared lock. Fails unless the proposal is `APPROVED`.
    pub fn sign(self, lock: &LockPayload) -> Result<Proposal<Signed>, LifecycleError> {
        match self {
            Self::Approved(p) => Ok(p.sign(lock)),
            other if other.status().is_immutable() => Err(LifecycleError::AlreadyImmutable {
                status: other.status(),
            }),
            other => Err(LifecycleError::InvalidTransition {
                from: other.status(),
                to: DocumentStatus::Signed,
                reason: None,
            }),
        }
    }

    /// Separate editable proposals from locked ones.
    pub fn split(self) -> ProposalView {
        match self {
            Self::Signed(p) => ProposalView::Locked(LockedProposal {
                document: p.into_document(),
            }),
            Self::Closed(p) => ProposalView::Locked(LockedProposal {
                document: p.into_document(),
            }),
            other => ProposalView::Editable(EditableProposal {
                document: other.into_document(),
            }),
        }
    }
}

/// Result of [`AnyProposal::split`].
#[derive(Debug, Clone)]
pub enum ProposalView {
    Editable(EditableProposal),
    Locked(LockedProposal),
}

/// A proposal in `DRAFT`, `PENDING_REVIEW`, `APPROVED` or `CANCELLED`.
#[derive(Debug, Clone)]
pub struct EditableProposal {
    document: Document,
}

impl EditableProposal {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn status(&self) -> DocumentStatus {
        self.document.status
    }

    pub fn replace_content(&mut self, content: DocumentContent, now: DateTime<Utc>) {
        self.document.content = content;
        self.document.updated_at = now;
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

/// A proposal in `SIGNED` or `CLOSED`. Read-only.
#[derive(Debug, Clone)]
pub struct LockedProposal {
    document: Document,
}

impl LockedProposal {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn status(&self) -> DocumentStatus {
        self.document.status
    }

    pub fn document_hash(&self) -> Option<ContentDigest> {
        self.document.document_hash
    }

    pub fn locked_at(&self) -> Option<DateTime<Utc>> {
        self.document.locked_at
    }

    /// The error every mutation attempt against this proposal reports.
    pub fn immutable_error(&self) -> LifecycleError {
        LifecycleError::AlreadyImmutable {
            status: self.document.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentContent;
    use crate::status::can_transition;

    fn content(title: &str) -> DocumentContent {
        DocumentContent {
            title: title.to_string(),
            body: serde_json::json!({"scope": "scoreboard"}),
            financial_snapshot: None,
        }
    }

    fn lock_for(doc: &Document, now: DateTime<Utc>) -> LockPayload {
        LockPayload {
            status: DocumentStatus::Signed,
            is_locked: true,
            locked_at: now,
            document_hash: doc.content.digest().unwrap(),
        }
    }

    fn document_in(status: DocumentStatus) -> Document {
        let mut doc = Document::new_draft(content("Any"), Utc::now());
        doc.status = status;
        if status.is_immutable() {
            doc.locked_at = Some(Utc::now());
            doc.document_hash = Some(doc.content.digest().unwrap());
        }
        doc
    }

    #[test]
    fn happy_path_through_the_typed_api() {
        let now = Utc::now();
        let draft = Proposal::<Draft>::new(content("Arena"), now);
        let approved = draft.submit(now).approve(now);
        let lock = lock_for(approved.document(), now);
        let signed = approved.sign(&lock);

        assert_eq!(signed.status(), DocumentStatus::Signed);
        assert!(signed.document().is_locked());
        assert_eq!(signed.document().document_hash, Some(lock.document_hash));
        assert_eq!(signed.document().locked_at, Some(now));

        let closed = signed.close(now);
        assert_eq!(closed.status(), DocumentStatus::Closed);
        assert_eq!(closed.document().document_hash, Some(lock.document_hash));
    }

    #[test]
    fn editable_states_accept_content() {
        let now = Utc::now();
        let mut draft = Proposal::<Draft>::new(content("Old"), now);
        draft.replace_content(content("New"), now);
        assert_eq!(draft.content().title, "New");

        let mut cancelled = draft.cancel(now);
        cancelled.replace_content(content("Revived"), now);
        let reopened = cancelled.return_to_draft(now);
        assert_eq!(reopened.content().title, "Revived");
        assert_eq!(reopened.status(), DocumentStatus::Draft);
    }

    #[test]
    fn dynamic_transition_agrees_with_the_table() {
        for from in DocumentStatus::ALL {
            for to in DocumentStatus::ALL {
                let result = AnyProposal::from_document(document_in(from)).transition(to, Utc::now());
                let expected = can_transition(from, to) && to != DocumentStatus::Signed;
                assert_eq!(result.is_ok(), expected, "{from} -> {to}");
                if let Ok(next) = result {
                    assert_eq!(next.status(), to);
                }
            }
        }
    }

    #[test]
    fn dynamic_sign_requires_approved() {
        let now = Utc::now();
        let approved = document_in(DocumentStatus::Approved);
        let lock = lock_for(&approved, now);
        assert!(AnyProposal::from_document(approved).sign(&lock).is_ok());

        let err = AnyProposal::from_document(document_in(DocumentStatus::Draft))
            .sign(&lock)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));

        let err = AnyProposal::from_document(document_in(DocumentStatus::Signed))
            .sign(&lock)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyImmutable { status: DocumentStatus::Signed }));
    }

    #[test]
    fn split_locks_exactly_the_immutable_statuses() {
        for status in DocumentStatus::ALL {
            match AnyProposal::from_document(document_in(status)).split() {
                ProposalView::Editable(e) => {
                    assert!(!status.is_immutable());
                    assert_eq!(e.status(), status);
                }
                ProposalView::Locked(l) => {
                    assert!(status.is_immutable());
                    assert!(l.document_hash().is_some());
                    assert!(matches!(
                        l.immutable_error(),
                        LifecycleError::AlreadyImmutable { .. }
                    ));
                }
            }
        }
    }

    #[test]
    fn transitions_stamp_updated_at() {
        let created = Utc::now();
        let later = created + chrono::Duration::seconds(30);
        let submitted = Proposal::<Draft>::new(content("T"), created).submit(later);
        assert_eq!(submitted.document().created_at, created);
        assert_eq!(submitted.document().updated_at, later);
    }
}
