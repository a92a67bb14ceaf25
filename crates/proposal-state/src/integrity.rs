//! # Integrity Verification and Reconciliation
//!
//! Two read-only checks over persisted state:
//!
//! - [`verify_document`] recomputes one document's content hash and compares
//!   it with the fingerprint stored at signing time and with its audit trail.
//! - [`reconcile`] sweeps the whole store for broken lock/audit/lineage
//!   invariants.
//!
//! Both only report. Nothing in this module repairs a document or accepts
//! a mismatched hash as valid.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use proposal_core::{
    AuditRecordId, CanonicalizationError, ContentDigest, DocumentId, IntegrityViolation,
};

use crate::document::{Document, DocumentContent, SignatureAuditRecord};
use crate::error::LifecycleError;
use crate::status::DocumentStatus;

/// Recompute the hash of `content` and compare it with `stored`.
///
/// Returns the recomputed digest when it matches.
pub fn verify_content_hash(
    content: &DocumentContent,
    stored: &ContentDigest,
) -> Result<ContentDigest, LifecycleError> {
    let actual = content.digest()?;
    if actual != *stored {
        return Err(IntegrityViolation {
            expected: *stored,
            actual,
        }
        .into());
    }
    Ok(actual)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityVerdict {
    /// Stored hash, recomputed hash and every audit copy agree.
    Verified,
    /// Some hash disagrees with the stored fingerprint.
    Mismatch,
    /// Lock fields disagree with each other or with the audit trail.
    Inconsistent,
    /// Not signed yet, so there is nothing to verify against.
    Unsigned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub document_id: DocumentId,
    pub status: DocumentStatus,
    pub verdict: IntegrityVerdict,
    pub stored_hash: Option<ContentDigest>,
    pub computed_hash: ContentDigest,
    pub audit_record_count: usize,
    pub audit_hashes_match: bool,
}

impl IntegrityReport {
    pub fn is_violation(&self) -> bool {
        matches!(
            self.verdict,
            IntegrityVerdict::Mismatch | IntegrityVerdict::Inconsistent
        )
    }
}

/// Check one document against its stored fingerprint and audit records.
pub fn verify_document(
    document: &Document,
    audits: &[SignatureAuditRecord],
) -> Result<IntegrityReport, CanonicalizationError> {
    let computed_hash = document.content.digest()?;
    let own: Vec<&SignatureAuditRecord> = audits
        .iter()
        .filter(|a| a.document_id == document.id)
        .collect();
    let audit_hashes_match = match document.document_hash {
        Some(stored) => own.iter().all(|a| a.document_hash == stored),
        None => own.is_empty(),
    };

    let verdict = match (document.is_locked(), document.document_hash) {
        (false, None) if own.is_empty() => IntegrityVerdict::Unsigned,
        (true, Some(stored)) => {
            if stored != computed_hash || !audit_hashes_match {
                IntegrityVerdict::Mismatch
            } else if own.len() != 1 || document.locked_at.is_none() {
                IntegrityVerdict::Inconsistent
            } else {
                IntegrityVerdict::Verified
            }
        }
        _ => IntegrityVerdict::Inconsistent,
    };

    Ok(IntegrityReport {
        document_id: document.id,
        status: document.status,
        verdict,
        stored_hash: document.document_hash,
        computed_hash,
        audit_record_count: own.len(),
        audit_hashes_match,
    })
}

/// A broken invariant found by [`reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingKind {
    LockedWithoutHash,
    HashWithoutLock,
    MissingLockTimestamp,
    ContentHashMismatch,
    MissingAuditRecord,
    DuplicateAuditRecords,
    AuditHashMismatch,
    AuditOnUnlockedDocument,
    OrphanAuditRecord,
    DanglingParent,
    LineageVersionBreak,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationFinding {
    pub kind: FindingKind,
    pub document_id: DocumentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_record_id: Option<AuditRecordId>,
    pub detail: String,
}

impl ReconciliationFinding {
    fn document(kind: FindingKind, document_id: DocumentId, detail: impl Into<String>) -> Self {
        Self {
            kind,
            document_id,
            audit_record_id: None,
            detail: detail.into(),
        }
    }

    fn audit(kind: FindingKind, record: &SignatureAuditRecord, detail: impl Into<String>) -> Self {
        Self {
            kind,
            document_id: record.document_id,
            audit_record_id: Some(record.id),
            detail: detail.into(),
        }
    }
}

/// Sweep a full snapshot of documents and audit records for invariant
/// breaks. Findings are ordered by document, then by audit record.
pub fn reconcile(
    documents: &[Document],
    audits: &[SignatureAuditRecord],
) -> Vec<ReconciliationFinding> {
    let by_id: HashMap<DocumentId, &Document> = documents.iter().map(|d| (d.id, d)).collect();
    let mut trails: BTreeMap<DocumentId, Vec<&SignatureAuditRecord>> = BTreeMap::new();
    for record in audits {
        trails.entry(record.document_id).or_default().push(record);
    }

    let mut ordered: Vec<&Document> = documents.iter().collect();
    ordered.sort_by_key(|d| d.id);

    let mut findings = Vec::new();
    for doc in ordered {
        let trail = trails.remove(&doc.id).unwrap_or_default();
        check_lock_fields(doc, &mut findings);
        check_audit_trail(doc, &trail, &mut findings);
        check_lineage(doc, &by_id, &mut findings);
    }

    for record in trails.into_values().flatten() {
        findings.push(ReconciliationFinding::audit(
            FindingKind::OrphanAuditRecord,
            record,
            "audit record references a document that does not exist",
        ));
    }
    findings
}

fn check_lock_fields(doc: &Document, findings: &mut Vec<ReconciliationFinding>) {
    match (doc.is_locked(), doc.document_hash) {
        (true, None) => findings.push(ReconciliationFinding::document(
            FindingKind::LockedWithoutHash,
            doc.id,
            format!("{} document has no documentHash", doc.status),
        )),
        (false, Some(_)) => findings.push(ReconciliationFinding::document(
            FindingKind::HashWithoutLock,
            doc.id,
            format!("{} document carries a documentHash", doc.status),
        )),
        (true, Some(stored)) => match doc.content.digest() {
            Ok(actual) if actual == stored => {}
            Ok(actual) => findings.push(ReconciliationFinding::document(
                FindingKind::ContentHashMismatch,
                doc.id,
                IntegrityViolation {
                    expected: stored,
                    actual,
                }
                .to_string(),
            )),
            Err(e) => findings.push(ReconciliationFinding::document(
                FindingKind::ContentHashMismatch,
                doc.id,
                format!("content cannot be canonicalized: {e}"),
            )),
        },
        (false, None) => {}
    }
    if doc.is_locked() && doc.locked_at.is_none() {
        findings.push(ReconciliationFinding::document(
            FindingKind::MissingLockTimestamp,
            doc.id,
            format!("{} document has no lockedAt", doc.status),
        ));
    }
}

fn check_audit_trail(
    doc: &Document,
    trail: &[&SignatureAuditRecord],
    findings: &mut Vec<ReconciliationFinding>,
) {
    if !doc.is_locked() {
        for record in trail {
            findings.push(ReconciliationFinding::audit(
                FindingKind::AuditOnUnlockedDocument,
                record,
                format!("audit record attached to a {} document", doc.status),
            ));
        }
        return;
    }

    match trail.len() {
        0 => findings.push(ReconciliationFinding::document(
            FindingKind::MissingAuditRecord,
            doc.id,
            format!("{} document has no signature audit record", doc.status),
        )),
        1 => {}
        n => findings.push(ReconciliationFinding::document(
            FindingKind::DuplicateAuditRecords,
            doc.id,
            format!("{} document has {n} signature audit records", doc.status),
        )),
    }

    if let Some(stored) = doc.document_hash {
        for record in trail.iter().filter(|r| r.document_hash != stored) {
            findings.push(ReconciliationFinding::audit(
                FindingKind::AuditHashMismatch,
                record,
                format!(
                    "audit record hash {} differs from document hash {stored}",
                    record.document_hash
                ),
            ));
        }
    }
}

fn check_lineage(
    doc: &Document,
    by_id: &HashMap<DocumentId, &Document>,
    findings: &mut Vec<ReconciliationFinding>,
) {
    match doc.parent_document_id {
        None if doc.version_number == 0 => findings.push(ReconciliationFinding::document(
            FindingKind::LineageVersionBreak,
            doc.id,
            "versionNumber must be at least 1",
        )),
        None => {}
        Some(parent_id) => match by_id.get(&parent_id) {
            None => findings.push(ReconciliationFinding::document(
                FindingKind::DanglingParent,
                doc.id,
                format!("parent document {parent_id} does not exist"),
            )),
            Some(parent) if doc.version_number != parent.version_number.saturating_add(1) => {
                findings.push(ReconciliationFinding::document(
                    FindingKind::LineageVersionBreak,
                    doc.id,
                    format!(
                        "version {} does not follow parent version {}",
                        doc.version_number, parent.version_number
                    ),
                ))
            }
            Some(_) => {}
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{AuthMethod, SignerRole};
    use crate::versioning::prepare_clone;
    use chrono::Utc;

    fn signed(title: &str) -> (Document, SignatureAuditRecord) {
        let mut doc = Document::new_draft(
            DocumentContent {
                title: title.to_string(),
                body: serde_json::json!({"sections": []}),
                financial_snapshot: None,
            },
            Utc::now(),
        );
        let hash = doc.content.digest().unwrap();
        doc.status = DocumentStatus::Signed;
        doc.locked_at = Some(Utc::now());
        doc.document_hash = Some(hash);
        let record = SignatureAuditRecord {
            id: AuditRecordId::new(),
            document_id: doc.id,
            signer_email: "a@b.com".into(),
            signer_name: "A B".into(),
            signer_title: None,
            signer_role: SignerRole::Purchaser,
            ip_address: "1.2.3.4".into(),
            user_agent: None,
            auth_method: AuthMethod::EmailLink,
            document_hash: hash,
            signed_at: Utc::now(),
        };
        (doc, record)
    }

    fn kinds(findings: &[ReconciliationFinding]) -> Vec<FindingKind> {
        findings.iter().map(|f| f.kind).collect()
    }

    #[test]
    fn verify_content_hash_detects_tampering() {
        let (mut doc, _) = signed("Board");
        let stored = doc.document_hash.unwrap();
        assert!(verify_content_hash(&doc.content, &stored).is_ok());

        doc.content.title = "Board (edited)".into();
        let err = verify_content_hash(&doc.content, &stored).unwrap_err();
        assert_eq!(err.code().as_str(), "INTEGRITY_VIOLATION");
    }

    #[test]
    fn clean_signed_document_verifies() {
        let (doc, record) = signed("Board");
        let report = verify_document(&doc, &[record]).unwrap();
        assert_eq!(report.verdict, IntegrityVerdict::Verified);
        assert!(!report.is_violation());
        assert_eq!(report.audit_record_count, 1);
    }

    #[test]
    fn tampered_content_is_a_mismatch() {
        let (mut doc, record) = signed("Board");
        doc.content.body = serde_json::json!({"sections": ["injected"]});
        let report = verify_document(&doc, &[record]).unwrap();
        assert_eq!(report.verdict, IntegrityVerdict::Mismatch);
        assert!(report.is_violation());
        assert_ne!(Some(report.computed_hash), report.stored_hash);
    }

    #[test]
    fn draft_is_unsigned() {
        let doc = Document::new_draft(
            DocumentContent {
                title: "Draft".into(),
                body: serde_json::Value::Null,
                financial_snapshot: None,
            },
            Utc::now(),
        );
        let report = verify_document(&doc, &[]).unwrap();
        assert_eq!(report.verdict, IntegrityVerdict::Unsigned);
    }

    #[test]
    fn signed_without_audit_is_inconsistent() {
        let (doc, _) = signed("Board");
        let report = verify_document(&doc, &[]).unwrap();
        assert_eq!(report.verdict, IntegrityVerdict::Inconsistent);
    }

    #[test]
    fn consistent_store_has_no_findings() {
        let (doc, record) = signed("Board");
        let draft = prepare_clone(&doc).into_document(DocumentId::new(), Utc::now());
        assert!(reconcile(&[doc, draft], &[record]).is_empty());
    }

    #[test]
    fn signed_without_audit_record_is_reported() {
        let (doc, _) = signed("Board");
        assert_eq!(
            kinds(&reconcile(&[doc], &[])),
            vec![FindingKind::MissingAuditRecord]
        );
    }

    #[test]
    fn audit_without_lock_is_reported() {
        let (mut doc, record) = signed("Board");
        doc.status = DocumentStatus::Approved;
        doc.document_hash = None;
        doc.locked_at = None;
        assert_eq!(
            kinds(&reconcile(&[doc], &[record])),
            vec![FindingKind::AuditOnUnlockedDocument]
        );
    }

    #[test]
    fn duplicate_and_divergent_audits_are_reported() {
        let (doc, record) = signed("Board");
        let mut second = record.clone();
        second.id = AuditRecordId::new();
        second.document_hash = ContentDigest::from_bytes([7u8; 32]);
        let found = kinds(&reconcile(&[doc], &[record, second]));
        assert!(found.contains(&FindingKind::DuplicateAuditRecords));
        assert!(found.contains(&FindingKind::AuditHashMismatch));
    }

    #[test]
    fn lock_field_breaks_are_reported() {
        let (mut doc, record) = signed("Board");
        doc.document_hash = None;
        doc.locked_at = None;
        let found = kinds(&reconcile(&[doc], &[record]));
        assert!(found.contains(&FindingKind::LockedWithoutHash));
        assert!(found.contains(&FindingKind::MissingLockTimestamp));
    }

    #[test]
    fn tampered_content_is_reported() {
        let (mut doc, record) = signed("Board");
        doc.content.title = "Silently edited".into();
        assert_eq!(
            kinds(&reconcile(&[doc], &[record])),
            vec![FindingKind::ContentHashMismatch]
        );
    }

    #[test]
    fn orphan_audit_is_reported() {
        let (_, record) = signed("Gone");
        let findings = reconcile(&[], &[record.clone()]);
        assert_eq!(kinds(&findings), vec![FindingKind::OrphanAuditRecord]);
        assert_eq!(findings[0].audit_record_id, Some(record.id));
    }

    #[test]
    fn lineage_breaks_are_reported() {
        let (doc, record) = signed("Board");
        let mut skipped = prepare_clone(&doc).into_document(DocumentId::new(), Utc::now());
        skipped.version_number = 5;
        let mut dangling = prepare_clone(&doc).into_document(DocumentId::new(), Utc::now());
        dangling.parent_document_id = Some(DocumentId::new());

        let found = kinds(&reconcile(&[doc, skipped, dangling], &[record]));
        assert!(found.contains(&FindingKind::LineageVersionBreak));
        assert!(found.contains(&FindingKind::DanglingParent));
        assert_eq!(found.len(), 2);
    }
}
