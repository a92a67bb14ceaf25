//! # Signature Coordinator
//!
//! Validates a sign request against the current status and the signer's
//! data, then produces the two payloads the orchestration layer must
//! persist atomically: the document lock and the audit record.
//!
//! Preconditions are checked in a fixed order, each with its own failure:
//!
//! 1. an already locked document reports `AlreadyImmutable`;
//! 2. `can_transition(current, SIGNED)` must hold, else `InvalidTransition`;
//! 3. `signerEmail` then `signerName` must be non-blank, else `MissingField`;
//! 4. `ipAddress` must be non-blank, else `MissingField("ipAddress")`.
//!
//! Nothing here performs I/O or reads the clock; `now` is injected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use proposal_core::{AuditRecordId, CanonicalizationError, ContentDigest, DocumentId};

use crate::document::{AuthMethod, DocumentContent, SignatureAuditRecord, SignerRole};
use crate::error::LifecycleError;
use crate::status::{can_transition, DocumentStatus};

/// Signer data supplied with a sign request.
///
/// `ipAddress` and `userAgent` are normally captured from the network layer
/// by the caller, not typed by the signer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerPayload {
    #[serde(default)]
    pub signer_email: String,
    #[serde(default)]
    pub signer_name: String,
    #[serde(default)]
    pub signer_title: Option<String>,
    pub signer_role: SignerRole,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub auth_method: Option<AuthMethod>,
}

/// Fields written to the document when it enters `SIGNED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockPayload {
    pub status: DocumentStatus,
    pub is_locked: bool,
    pub locked_at: DateTime<Utc>,
    pub document_hash: ContentDigest,
}

/// The audit record to insert alongside the lock, minus storage identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditPayload {
    pub signer_email: String,
    pub signer_name: String,
    pub signer_title: Option<String>,
    pub signer_role: SignerRole,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub auth_method: AuthMethod,
    pub document_hash: ContentDigest,
    pub signed_at: DateTime<Utc>,
}

impl AuditPayload {
    pub fn into_record(self, id: AuditRecordId, document_id: DocumentId) -> SignatureAuditRecord {
        SignatureAuditRecord {
            id,
            document_id,
            signer_email: self.signer_email,
            signer_name: self.signer_name,
            signer_title: self.signer_title,
            signer_role: self.signer_role,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            auth_method: self.auth_method,
            document_hash: self.document_hash,
            signed_at: self.signed_at,
        }
    }
}

/// Both payloads of a validated sign request. They share one hash and one
/// timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSignature {
    pub lock: LockPayload,
    pub audit: AuditPayload,
}

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("document is {status} and cannot be signed again")]
    AlreadyImmutable { status: DocumentStatus },

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

impl From<SignatureError> for LifecycleError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::AlreadyImmutable { status } => Self::AlreadyImmutable { status },
            SignatureError::InvalidTransition { from, to } => Self::InvalidTransition {
                from,
                to,
                reason: None,
            },
            SignatureError::MissingField { field } => Self::MissingField { field },
            SignatureError::Canonicalization(e) => Self::Canonicalization(e),
        }
    }
}

fn required(value: &str, field: &'static str) -> Result<String, SignatureError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SignatureError::MissingField { field });
    }
    Ok(trimmed.to_string())
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Validate a sign request and build the lock and audit payloads.
pub fn prepare_signature(
    current: DocumentStatus,
    content: &DocumentContent,
    signer: &SignerPayload,
    now: DateTime<Utc>,
) -> Result<PreparedSignature, SignatureError> {
    if current.is_immutable() {
        return Err(SignatureError::AlreadyImmutable { status: current });
    }
    if !can_transition(current, DocumentStatus::Signed) {
        return Err(SignatureError::InvalidTransition {
            from: current,
            to: DocumentStatus::Signed,
        });
    }

    let signer_email = required(&signer.signer_email, "signerEmail")?;
    let signer_name = required(&signer.signer_name, "signerName")?;
    let ip_address = required(signer.ip_address.as_deref().unwrap_or_default(), "ipAddress")?;

    let document_hash = content.digest()?;

    Ok(PreparedSignature {
        lock: LockPayload {
            status: DocumentStatus::Signed,
            is_locked: true,
            locked_at: now,
            document_hash,
        },
        audit: AuditPayload {
            signer_email,
            signer_name,
            signer_title: optional(&signer.signer_title),
            signer_role: signer.signer_role,
            ip_address,
            user_agent: optional(&signer.user_agent),
            auth_method: signer.auth_method.unwrap_or_default(),
            document_hash,
            signed_at: now,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FinancialSnapshot;

    fn content() -> DocumentContent {
        DocumentContent {
            title: "Concourse Ribbon".to_string(),
            body: serde_json::json!({"sections": [{"heading": "Scope", "order": 1}]}),
            financial_snapshot: Some(FinancialSnapshot(serde_json::json!({"total": 98000.5}))),
        }
    }

    fn signer() -> SignerPayload {
        SignerPayload {
            signer_email: "a@b.com".to_string(),
            signer_name: "A B".to_string(),
            signer_title: None,
            signer_role: SignerRole::Purchaser,
            ip_address: Some("1.2.3.4".to_string()),
            user_agent: None,
            auth_method: None,
        }
    }

    #[test]
    fn approved_document_produces_matching_payloads() {
        let now = Utc::now();
        let prepared = prepare_signature(DocumentStatus::Approved, &content(), &signer(), now).unwrap();

        assert_eq!(prepared.lock.status, DocumentStatus::Signed);
        assert!(prepared.lock.is_locked);
        assert_eq!(prepared.lock.locked_at, now);
        assert_eq!(prepared.audit.signed_at, now);
        assert_eq!(prepared.lock.document_hash, prepared.audit.document_hash);
        assert_eq!(prepared.lock.document_hash, content().digest().unwrap());
        assert_eq!(prepared.audit.ip_address, "1.2.3.4");
        assert_eq!(prepared.audit.auth_method, AuthMethod::EmailLink);
    }

    #[test]
    fn non_approved_statuses_are_invalid_transitions() {
        for status in [
            DocumentStatus::Draft,
            DocumentStatus::PendingReview,
            DocumentStatus::Cancelled,
        ] {
            let err = prepare_signature(status, &content(), &signer(), Utc::now()).unwrap_err();
            assert!(
                matches!(err, SignatureError::InvalidTransition { from, to: DocumentStatus::Signed } if from == status),
                "{status}: {err}"
            );
        }
    }

    #[test]
    fn locked_statuses_are_already_immutable() {
        for status in [DocumentStatus::Signed, DocumentStatus::Closed] {
            let err = prepare_signature(status, &content(), &signer(), Utc::now()).unwrap_err();
            assert!(matches!(err, SignatureError::AlreadyImmutable { status: s } if s == status));
        }
    }

    #[test]
    fn missing_email_is_reported_first() {
        let mut s = signer();
        s.signer_email = "   ".to_string();
        s.ip_address = None;
        let err = prepare_signature(DocumentStatus::Approved, &content(), &s, Utc::now()).unwrap_err();
        assert!(matches!(err, SignatureError::MissingField { field: "signerEmail" }));
    }

    #[test]
    fn missing_name_is_reported() {
        let mut s = signer();
        s.signer_name = String::new();
        let err = prepare_signature(DocumentStatus::Approved, &content(), &s, Utc::now()).unwrap_err();
        assert!(matches!(err, SignatureError::MissingField { field: "signerName" }));
    }

    #[test]
    fn missing_ip_address_is_reported() {
        let mut s = signer();
        s.ip_address = None;
        let err = prepare_signature(DocumentStatus::Approved, &content(), &s, Utc::now()).unwrap_err();
        assert!(matches!(err, SignatureError::MissingField { field: "ipAddress" }));

        s.ip_address = Some(String::new());
        let err = prepare_signature(DocumentStatus::Approved, &content(), &s, Utc::now()).unwrap_err();
        assert!(matches!(err, SignatureError::MissingField { field: "ipAddress" }));
    }

    #[test]
    fn transition_is_checked_before_signer_fields() {
        let mut s = signer();
        s.signer_email = String::new();
        let err = prepare_signature(DocumentStatus::Draft, &content(), &s, Utc::now()).unwrap_err();
        assert!(matches!(err, SignatureError::InvalidTransition { .. }));
    }

    #[test]
    fn optional_fields_are_carried_through() {
        let mut s = signer();
        s.signer_title = Some("CFO".to_string());
        s.user_agent = Some("Mozilla/5.0".to_string());
        s.auth_method = Some(AuthMethod::Sso);
        s.signer_role = SignerRole::AncRepresentative;
        let prepared = prepare_signature(DocumentStatus::Approved, &content(), &s, Utc::now()).unwrap();
        assert_eq!(prepared.audit.signer_title.as_deref(), Some("CFO"));
        assert_eq!(prepared.audit.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(prepared.audit.auth_method, AuthMethod::Sso);
        assert_eq!(prepared.audit.signer_role, SignerRole::AncRepresentative);
    }

    #[test]
    fn payload_deserializes_from_the_wire_shape() {
        let s: SignerPayload = serde_json::from_str(
            r#"{"signerEmail":"a@b.com","signerName":"A B","signerRole":"PURCHASER","ipAddress":"1.2.3.4"}"#,
        )
        .unwrap();
        assert_eq!(s, signer());
    }

    #[test]
    fn audit_payload_becomes_a_record() {
        let prepared = prepare_signature(DocumentStatus::Approved, &content(), &signer(), Utc::now()).unwrap();
        let doc_id = DocumentId::new();
        let record_id = AuditRecordId::new();
        let record = prepared.audit.clone().into_record(record_id, doc_id);
        assert_eq!(record.id, record_id);
        assert_eq!(record.document_id, doc_id);
        assert_eq!(record.document_hash, prepared.lock.document_hash);
        assert_eq!(record.signer_email, "a@b.com");
    }

    #[test]
    fn errors_convert_into_lifecycle_codes() {
        let err: LifecycleError = SignatureError::MissingField { field: "ipAddress" }.into();
        assert_eq!(err.code().as_str(), "MISSING_FIELD");
        let err: LifecycleError = SignatureError::AlreadyImmutable {
            status: DocumentStatus::Signed,
        }
        .into();
        assert_eq!(err.code().as_str(), "ALREADY_IMMUTABLE");
    }
}
