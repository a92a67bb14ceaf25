//! # Version Cloner
//!
//! Produces the editable successor of a document: same content, fresh
//! lifecycle, a parent pointer and the next version number. Storage
//! identity (`id`, timestamps, sharing handles) is left for the repository
//! to assign.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use proposal_core::DocumentId;

use crate::document::{Document, DocumentContent};
use crate::error::LifecycleError;
use crate::status::DocumentStatus;

/// Which sources the orchestration layer is willing to clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClonePolicy {
    /// Clone from any status.
    #[default]
    Any,
    /// Clone only `SIGNED` or `CLOSED` documents.
    LockedOnly,
}

impl ClonePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::LockedOnly => "locked-only",
        }
    }

    pub fn permits(&self, status: DocumentStatus) -> bool {
        match self {
            Self::Any => true,
            Self::LockedOnly => status.is_immutable(),
        }
    }

    pub fn check(&self, source: &Document) -> Result<(), LifecycleError> {
        if self.permits(source.status) {
            Ok(())
        } else {
            Err(LifecycleError::CloneNotPermitted {
                status: source.status,
                policy: *self,
            })
        }
    }
}

impl fmt::Display for ClonePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClonePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "locked-only" | "locked_only" => Ok(Self::LockedOnly),
            other => Err(format!(
                "unknown clone policy '{other}' (expected 'any' or 'locked-only')"
            )),
        }
    }
}

/// A new draft body derived from a source document, before the repository
/// assigns it an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ClonedDocumentDraft {
    pub parent_document_id: DocumentId,
    pub version_number: u32,
    pub content: DocumentContent,
}

impl ClonedDocumentDraft {
    /// Always `DRAFT`; the clone starts a fresh lifecycle.
    pub fn status(&self) -> DocumentStatus {
        DocumentStatus::Draft
    }

    /// Materialize the draft with a repository-assigned id and timestamps.
    pub fn into_document(self, id: DocumentId, now: DateTime<Utc>) -> Document {
        Document {
            id,
            status: DocumentStatus::Draft,
            locked_at: None,
            document_hash: None,
            parent_document_id: Some(self.parent_document_id),
            version_number: self.version_number,
            content: self.content,
            share_token: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Build the successor draft of `source`. No status precondition here; see
/// [`ClonePolicy`].
pub fn prepare_clone(source: &Document) -> ClonedDocumentDraft {
    let version_number = source.version_number.saturating_add(1);
    let mut content = source.content.clone();
    content.title = versioned_title(&content.title, version_number);
    ClonedDocumentDraft {
        parent_document_id: source.id,
        version_number,
        content,
    }
}

/// Decorate a title with `(v{n})`, replacing an existing version suffix.
pub fn versioned_title(title: &str, version: u32) -> String {
    let base = strip_version_suffix(title).trim_end();
    if base.is_empty() {
        format!("(v{version})")
    } else {
        format!("{base} (v{version})")
    }
}

fn strip_version_suffix(title: &str) -> &str {
    let trimmed = title.trim_end();
    let Some(inner) = trimmed.strip_suffix(')') else {
        return title;
    };
    let Some(open) = inner.rfind("(v") else {
        return title;
    };
    let digits = &inner[open + 2..];
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        &trimmed[..open]
    } else {
        title
    }
}
