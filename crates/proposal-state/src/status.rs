//! # Transition Table
//!
//! The single source of truth for which status moves are legal and which
//! statuses are immutable.
//!
//! ```text
//! DRAFT ──▶ PENDING_REVIEW ──▶ APPROVED ──sign──▶ SIGNED ──▶ CLOSED
//!   ▲  │          │  │            │  │
//!   │  │          │  └──▶ DRAFT ◀─┘  │
//!   │  ▼          ▼                  ▼
//!   └── CANCELLED ◀──────────────────┘
//! ```
//!
//! Every "can edit / can sign / can close" answer shown to a user is derived
//! from [`DocumentStatus::valid_transitions`] through [`Capabilities`]; there
//! is no second lookup table.

use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;

/// Lifecycle status of a proposal document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    /// Initial state. Freely editable.
    Draft,
    /// Submitted for internal review.
    PendingReview,
    /// Approved and ready for signature.
    Approved,
    /// Signed. Locked; content frozen.
    Signed,
    /// Administratively closed. Terminal.
    Closed,
    /// Abandoned. May be reopened as a draft.
    Cancelled,
}

impl DocumentStatus {
    /// All statuses, in declaration order.
    pub const ALL: [DocumentStatus; 6] = [
        Self::Draft,
        Self::PendingReview,
        Self::Approved,
        Self::Signed,
        Self::Closed,
        Self::Cancelled,
    ];

    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::PendingReview => "PENDING_REVIEW",
            Self::Approved => "APPROVED",
            Self::Signed => "SIGNED",
            Self::Closed => "CLOSED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse a canonical status name. Returns `None` for anything else.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "DRAFT" => Some(Self::Draft),
            "PENDING_REVIEW" => Some(Self::PendingReview),
            "APPROVED" => Some(Self::Approved),
            "SIGNED" => Some(Self::Signed),
            "CLOSED" => Some(Self::Closed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Return the set of legal target statuses from this status.
    pub fn valid_transitions(&self) -> &'static [DocumentStatus] {
        match self {
            Self::Draft => &[Self::PendingReview, Self::Cancelled],
            Self::PendingReview => &[Self::Approved, Self::Draft, Self::Cancelled],
            Self::Approved => &[Self::Signed, Self::Draft, Self::Cancelled],
            Self::Signed => &[Self::Closed],
            Self::Closed => &[],
            Self::Cancelled => &[Self::Draft],
        }
    }

    /// Whether `self -> to` is a legal move.
    pub fn can_transition_to(&self, to: DocumentStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Whether documents in this status are locked against mutation.
    pub fn is_immutable(&self) -> bool {
        matches!(self, Self::Signed | Self::Closed)
    }

    /// Whether no further transitions exist.
    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `from -> to` is a legal move.
pub fn can_transition(from: DocumentStatus, to: DocumentStatus) -> bool {
    from.can_transition_to(to)
}

/// Whether `status` is one of the locked statuses (`SIGNED`, `CLOSED`).
pub fn is_immutable(status: DocumentStatus) -> bool {
    status.is_immutable()
}

/// Validate a simple (non-signing) status write before anything is mutated.
///
/// Entry into `SIGNED` carries a mandatory audit record and hash, so it is
/// rejected here even though it appears in the table; callers must go
/// through the signature flow instead.
pub fn plan_transition(
    current: DocumentStatus,
    target: DocumentStatus,
) -> Result<(), LifecycleError> {
    if target == DocumentStatus::Signed {
        return Err(LifecycleError::InvalidTransition {
            from: current,
            to: target,
            reason: Some("documents enter SIGNED only through the sign operation".to_string()),
        });
    }
    if !current.can_transition_to(target) {
        return Err(LifecycleError::InvalidTransition {
            from: current,
            to: target,
            reason: None,
        });
    }
    Ok(())
}

/// UI-facing capability summary, derived from the transition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub can_edit: bool,
    pub can_sign: bool,
    pub can_close: bool,
    pub can_cancel: bool,
    pub next_statuses: Vec<DocumentStatus>,
}

impl Capabilities {
    /// Derive capabilities for a status by querying the transition table.
    pub fn for_status(status: DocumentStatus) -> Self {
        Self {
            can_edit: status == DocumentStatus::Draft
                || can_transition(status, DocumentStatus::Draft),
            can_sign: can_transition(status, DocumentStatus::Signed),
            can_close: can_transition(status, DocumentStatus::Closed),
            can_cancel: can_transition(status, DocumentStatus::Cancelled),
            next_statuses: status.valid_transitions().to_vec(),
        }
    }
}
