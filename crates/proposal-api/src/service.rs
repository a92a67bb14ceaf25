//! # Lifecycle Orchestration
//!
//! [`DocumentService`] is the only place that combines pure lifecycle
//! decisions from `proposal-state` with repository writes. Each operation
//! reads the current document, decides with a pure function, then issues a
//! single conditional write keyed on the status it read. Nothing here
//! retries: a lost race surfaces to the caller as `CONFLICT`.
//!
//! ## Sign flow
//!
//! ```text
//! find_document ─► prepare_signature ─► commit_signature (lock + audit, one unit)
//! ```
//!
//! A validation failure in `prepare_signature` returns before any write, so
//! a rejected sign request leaves no trace in either table.

use std::collections::HashSet;

use chrono::Utc;
use metrics::counter;
use serde::Serialize;

use proposal_core::{AuditRecordId, DocumentId};
use proposal_state::{
    prepare_clone, prepare_signature, reconcile, verify_document, AnyProposal, ClonePolicy,
    Document, DocumentContent, DocumentStatus, IntegrityReport, LifecycleError, ProposalView,
    ReconciliationFinding, SignatureAuditRecord, SignerPayload,
};

use crate::repository::{LifecycleStore, Repository};

/// A committed signature: the locked document and its audit record.
#[derive(Debug, Clone, PartialEq)]
pub struct SignOutcome {
    pub document: Document,
    pub audit: SignatureAuditRecord,
}

/// One version in a lineage walk, with that version's own signatures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageEntry {
    pub document: Document,
    pub signatures: Vec<SignatureAuditRecord>,
}

/// Count and log a lost CAS race.
fn observe<T>(result: Result<T, LifecycleError>, operation: &'static str) -> Result<T, LifecycleError> {
    if let Err(LifecycleError::ConcurrentModification {
        document_id,
        expected,
    }) = &result
    {
        counter!("proposal_conflicts_total", "operation" => operation).increment(1);
        tracing::warn!(
            document_id = %document_id,
            expected = %expected,
            operation,
            "conditional write matched no rows"
        );
    }
    result
}

#[derive(Debug, Clone)]
pub struct DocumentService<S = Repository> {
    store: S,
    clone_policy: ClonePolicy,
}

impl<S: LifecycleStore> DocumentService<S> {
    pub fn new(store: S, clone_policy: ClonePolicy) -> Self {
        Self {
            store,
            clone_policy,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clone_policy(&self) -> ClonePolicy {
        self.clone_policy
    }

    /// Create a version-1 draft.
    pub async fn create(&self, content: DocumentContent) -> Result<Document, LifecycleError> {
        let document = Document::new_draft(content, Utc::now());
        self.store.insert_document(&document).await?;
        tracing::info!(document_id = %document.id, "document created");
        Ok(document)
    }

    pub async fn get(&self, id: DocumentId) -> Result<Document, LifecycleError> {
        self.store
            .find_document(id)
            .await?
            .ok_or(LifecycleError::NotFound { document_id: id })
    }

    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Document>, LifecycleError> {
        self.store.list_documents(limit, offset).await
    }

    /// Replace the content of an editable document.
    pub async fn update_content(
        &self,
        id: DocumentId,
        content: DocumentContent,
    ) -> Result<Document, LifecycleError> {
        let current = self.get(id).await?;
        let expected = match AnyProposal::from_document(current).split() {
            ProposalView::Locked(locked) => {
                tracing::info!(document_id = %id, status = %locked.status(), "edit refused on locked document");
                return Err(locked.immutable_error());
            }
            ProposalView::Editable(editable) => editable.status(),
        };
        let updated = observe(
            self.store
                .update_content(id, expected, &content, Utc::now())
                .await,
            "update_content",
        )?;
        tracing::info!(document_id = %id, status = %expected, "document content updated");
        Ok(updated)
    }

    /// Apply a simple (non-signing) status change.
    pub async fn transition(
        &self,
        id: DocumentId,
        target: DocumentStatus,
    ) -> Result<Document, LifecycleError> {
        let current = self.get(id).await?;
        let from = current.status;
        // Fail closed before touching storage.
        AnyProposal::from_document(current).transition(target, Utc::now())?;

        let updated = observe(
            self.store.update_status(id, from, target, Utc::now()).await,
            "transition",
        )?;
        tracing::info!(document_id = %id, from = %from, to = %target, "document transitioned");
        Ok(updated)
    }

    /// Sign an `APPROVED` document: lock it and record the signer atomically.
    pub async fn sign(
        &self,
        id: DocumentId,
        signer: &SignerPayload,
    ) -> Result<SignOutcome, LifecycleError> {
        let current = self.get(id).await?;
        let prepared = prepare_signature(current.status, &current.content, signer, Utc::now())
            .map_err(|err| {
                tracing::info!(document_id = %id, status = %current.status, error = %err, "sign request rejected");
                LifecycleError::from(err)
            })?;

        let audit = prepared.audit.into_record(AuditRecordId::new(), id);
        let document = observe(
            self.store
                .commit_signature(id, current.status, &prepared.lock, audit.clone())
                .await,
            "sign",
        )?;

        counter!("proposal_signatures_total", "role" => audit.signer_role.as_str()).increment(1);
        tracing::info!(
            document_id = %id,
            audit_record_id = %audit.id,
            document_hash = %prepared.lock.document_hash,
            signer_role = audit.signer_role.as_str(),
            "document signed and locked"
        );
        Ok(SignOutcome { document, audit })
    }

    /// Start the next version of a document as a fresh draft.
    pub async fn clone_document(&self, id: DocumentId) -> Result<Document, LifecycleError> {
        let source = self.get(id).await?;
        if let Err(err) = self.clone_policy.check(&source) {
            tracing::info!(document_id = %id, policy = %self.clone_policy, error = %err, "clone refused");
            return Err(err);
        }

        let clone = prepare_clone(&source).into_document(DocumentId::new(), Utc::now());
        self.store.insert_document(&clone).await?;

        counter!("proposal_clones_total").increment(1);
        tracing::info!(
            document_id = %clone.id,
            parent_document_id = %id,
            version = clone.version_number,
            "document cloned"
        );
        Ok(clone)
    }

    /// Audit trail of one document version.
    pub async fn signatures(
        &self,
        id: DocumentId,
    ) -> Result<Vec<SignatureAuditRecord>, LifecycleError> {
        self.get(id).await?;
        self.store.audits_for(id).await
    }

    /// The requested version followed by its ancestors, back to version 1.
    ///
    /// Each entry carries only its own audit records; a parent's signatures
    /// are never presented as the child's.
    pub async fn lineage(&self, id: DocumentId) -> Result<Vec<LineageEntry>, LifecycleError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(self.get(id).await?);

        while let Some(document) = next.take() {
            if !seen.insert(document.id) {
                tracing::error!(document_id = %document.id, "lineage cycle detected");
                break;
            }
            let signatures = self.store.audits_for(document.id).await?;
            let parent = document.parent_document_id;
            chain.push(LineageEntry {
                document,
                signatures,
            });

            if let Some(parent_id) = parent {
                next = self.store.find_document(parent_id).await?;
                if next.is_none() {
                    tracing::warn!(document_id = %parent_id, "lineage parent missing");
                }
            }
        }
        Ok(chain)
    }

    /// Recompute one document's hash and compare it with what was stored.
    pub async fn verify(&self, id: DocumentId) -> Result<IntegrityReport, LifecycleError> {
        let document = self.get(id).await?;
        let audits = self.store.audits_for(id).await?;
        let report = verify_document(&document, &audits)?;
        if report.is_violation() {
            counter!("proposal_integrity_violations_total").increment(1);
            tracing::error!(
                document_id = %id,
                verdict = ?report.verdict,
                stored_hash = ?report.stored_hash.map(|h| h.to_hex()),
                computed_hash = %report.computed_hash,
                "integrity violation"
            );
        }
        Ok(report)
    }

    /// Sweep every document and audit record for broken invariants.
    pub async fn reconcile(&self) -> Result<Vec<ReconciliationFinding>, LifecycleError> {
        let documents = self.store.all_documents().await?;
        let audits = self.store.all_audits().await?;
        let findings = reconcile(&documents, &audits);

        for finding in &findings {
            counter!("proposal_integrity_violations_total").increment(1);
            tracing::error!(
                document_id = %finding.document_id,
                audit_record_id = ?finding.audit_record_id,
                kind = ?finding.kind,
                detail = %finding.detail,
                "reconciliation finding"
            );
        }
        tracing::info!(
            documents = documents.len(),
            audit_records = audits.len(),
            findings = findings.len(),
            "reconciliation sweep complete"
        );
        Ok(findings)
    }

    pub async fn ping(&self) -> Result<(), LifecycleError> {
        self.store.ping().await
    }
}
