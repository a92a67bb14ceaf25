//! # Document Records
//!
//! The persisted shape of a proposal document and of the signature audit
//! records attached to it. These are plain records; mutation rules live in
//! [`crate::lifecycle`], which wraps a `Document` in a typestate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use proposal_core::{
    sha256_digest, AuditRecordId, CanonicalBytes, CanonicalizationError, ContentDigest,
    DocumentId,
};

use crate::status::DocumentStatus;

/// Pricing data owned by the pricing subsystem.
///
/// The lifecycle hashes and transports it, and never reads its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinancialSnapshot(pub serde_json::Value);

/// The hashed unit of a proposal: everything a signer agrees to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContent {
    /// Human-readable label.
    pub title: String,
    /// Structured proposal fields (scope, sections, terms, ...).
    #[serde(default)]
    pub body: serde_json::Value,
    #[serde(default)]
    pub financial_snapshot: Option<FinancialSnapshot>,
}

impl DocumentContent {
    /// Canonical SHA-256 fingerprint of this content.
    pub fn digest(&self) -> Result<ContentDigest, CanonicalizationError> {
        let canonical = CanonicalBytes::new(self)?;
        Ok(sha256_digest(&canonical))
    }
}

/// A proposal document.
///
/// `is_locked` is not stored: it is derived from `status` on every read so
/// the two can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub status: DocumentStatus,
    /// Set exactly once, on entry into `SIGNED`.
    pub locked_at: Option<DateTime<Utc>>,
    /// Set exactly once, on entry into `SIGNED`. Never recomputed.
    pub document_hash: Option<ContentDigest>,
    pub parent_document_id: Option<DocumentId>,
    /// Starts at 1; each clone is `parent + 1`.
    pub version_number: u32,
    pub content: DocumentContent,
    /// Publication handle for sharing the proposal outside the app.
    #[serde(default)]
    pub share_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a version-1 draft.
    pub fn new_draft(content: DocumentContent, now: DateTime<Utc>) -> Self {
        Self {
            id: DocumentId::new(),
            status: DocumentStatus::Draft,
            locked_at: None,
            document_hash: None,
            parent_document_id: None,
            version_number: 1,
            content,
            share_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True iff the status is `SIGNED` or `CLOSED`.
    pub fn is_locked(&self) -> bool {
        self.status.is_immutable()
    }
}

/// Which party signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignerRole {
    AncRepresentative,
    Purchaser,
}

impl SignerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AncRepresentative => "ANC_REPRESENTATIVE",
            Self::Purchaser => "PURCHASER",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ANC_REPRESENTATIVE" => Some(Self::AncRepresentative),
            "PURCHASER" => Some(Self::Purchaser),
            _ => None,
        }
    }
}

/// How the signer proved who they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMethod {
    #[default]
    EmailLink,
    Sso,
    Manual,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailLink => "EMAIL_LINK",
            Self::Sso => "SSO",
            Self::Manual => "MANUAL",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "EMAIL_LINK" => Some(Self::EmailLink),
            "SSO" => Some(Self::Sso),
            "MANUAL" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Append-only proof of who signed which content, when, and from where.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureAuditRecord {
    pub id: AuditRecordId,
    pub document_id: DocumentId,
    pub signer_email: String,
    pub signer_name: String,
    pub signer_title: Option<String>,
    pub signer_role: SignerRole,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub auth_method: AuthMethod,
    /// Copy of the document hash at signing time.
    pub document_hash: ContentDigest,
    pub signed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stadium_content() -> DocumentContent {
        DocumentContent {
            title: "Stadium Display".to_string(),
            body: serde_json::json!({"sections": [{"order": 1, "heading": "Pricing"}], "scope": "LED wall"}),
            financial_snapshot: Some(FinancialSnapshot(
                serde_json::json!({"total": 125000, "currency": "USD"}),
            )),
        }
    }

    #[test]
    fn content_digest_matches_frozen_vector() {
        assert_eq!(
            stadium_content().digest().unwrap().to_hex(),
            "c6a6015e6c25795289af9773998c915020e096fead2b23a3b1233cfe559c4026"
        );
    }

    #[test]
    fn new_draft_is_version_one_and_unlocked() {
        let doc = Document::new_draft(stadium_content(), Utc::now());
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert_eq!(doc.version_number, 1);
        assert!(!doc.is_locked());
        assert!(doc.document_hash.is_none());
        assert!(doc.locked_at.is_none());
        assert!(doc.parent_document_id.is_none());
    }

    #[test]
    fn content_deserializes_with_defaults() {
        let content: DocumentContent = serde_json::from_str(r#"{"title": "Bare"}"#).unwrap();
        assert_eq!(content.body, serde_json::Value::Null);
        assert!(content.financial_snapshot.is_none());
    }

    #[test]
    fn enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&SignerRole::AncRepresentative).unwrap(),
            "\"ANC_REPRESENTATIVE\""
        );
        assert_eq!(serde_json::to_string(&AuthMethod::EmailLink).unwrap(), "\"EMAIL_LINK\"");
        assert_eq!(SignerRole::from_name("PURCHASER"), Some(SignerRole::Purchaser));
        assert_eq!(AuthMethod::from_name("SSO"), Some(AuthMethod::Sso));
        assert_eq!(AuthMethod::default(), AuthMethod::EmailLink);
    }
}
