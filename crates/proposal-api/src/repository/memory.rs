//! In-memory store for development and tests.
//!
//! Both tables sit behind one `parking_lot::RwLock`, so a signature commit
//! checks the status, locks the document and appends the audit record
//! under a single write guard. The lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use proposal_core::DocumentId;
use proposal_state::{
    AnyProposal, Document, DocumentContent, DocumentStatus, LifecycleError, LockPayload,
    ProposalView, SignatureAuditRecord,
};

use super::{ensure_hashed_content, AuditRepository, DocumentRepository, LifecycleStore};

#[derive(Debug, Default)]
struct Tables {
    documents: HashMap<DocumentId, Document>,
    audits: Vec<SignatureAuditRecord>,
}

impl Tables {
    /// The CAS precondition shared by every conditional write.
    fn expect_status(
        &mut self,
        id: DocumentId,
        expected: DocumentStatus,
    ) -> Result<&mut Document, LifecycleError> {
        let document = self
            .documents
            .get_mut(&id)
            .ok_or(LifecycleError::NotFound { document_id: id })?;
        if document.status != expected {
            return Err(LifecycleError::ConcurrentModification {
                document_id: id,
                expected,
            });
        }
        Ok(document)
    }
}

/// Thread-safe, cloneable document and audit store.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentRepository for MemoryRepository {
    async fn insert_document(&self, document: &Document) -> Result<(), LifecycleError> {
        let mut tables = self.tables.write();
        if tables.documents.contains_key(&document.id) {
            return Err(LifecycleError::Persistence(format!(
                "document {} already exists",
                document.id
            )));
        }
        tables.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn find_document(&self, id: DocumentId) -> Result<Option<Document>, LifecycleError> {
        Ok(self.tables.read().documents.get(&id).cloned())
    }

    async fn list_documents(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Document>, LifecycleError> {
        let mut all: Vec<Document> = self.tables.read().documents.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn all_documents(&self) -> Result<Vec<Document>, LifecycleError> {
        Ok(self.tables.read().documents.values().cloned().collect())
    }

    async fn update_content(
        &self,
        id: DocumentId,
        expected: DocumentStatus,
        content: &DocumentContent,
        updated_at: DateTime<Utc>,
    ) -> Result<Document, LifecycleError> {
        let mut tables = self.tables.write();
        let document = tables.expect_status(id, expected)?;
        match AnyProposal::from_document(document.clone()).split() {
            ProposalView::Locked(locked) => Err(locked.immutable_error()),
            ProposalView::Editable(mut editable) => {
                editable.replace_content(content.clone(), updated_at);
                *document = editable.into_document();
                Ok(document.clone())
            }
        }
    }

    async fn update_status(
        &self,
        id: DocumentId,
        expected: DocumentStatus,
        target: DocumentStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Document, LifecycleError> {
        let mut tables = self.tables.write();
        let document = tables.expect_status(id, expected)?;
        let next = AnyProposal::from_document(document.clone()).transition(target, updated_at)?;
        *document = next.into_document();
        Ok(document.clone())
    }
}

impl AuditRepository for MemoryRepository {
    async fn audits_for(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<SignatureAuditRecord>, LifecycleError> {
        Ok(self
            .tables
            .read()
            .audits
            .iter()
            .filter(|a| a.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn all_audits(&self) -> Result<Vec<SignatureAuditRecord>, LifecycleError> {
        Ok(self.tables.read().audits.clone())
    }
}

impl LifecycleStore for MemoryRepository {
    async fn commit_signature(
        &self,
        id: DocumentId,
        expected: DocumentStatus,
        lock: &LockPayload,
        audit: SignatureAuditRecord,
    ) -> Result<Document, LifecycleError> {
        let mut guard = self.tables.write();
        let tables = &mut *guard;
        let document = tables.expect_status(id, expected)?;
        ensure_hashed_content(document, lock)?;
        let signed = AnyProposal::from_document(document.clone())
            .sign(lock)?
            .into_document();
        *document = signed.clone();
        tables.audits.push(audit);
        Ok(signed)
    }

    async fn ping(&self) -> Result<(), LifecycleError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proposal_core::AuditRecordId;
    use proposal_state::{prepare_signature, SignerPayload, SignerRole};

    fn approved() -> Document {
        let mut doc = Document::new_draft(
            DocumentContent {
                title: "Ribbon Board".into(),
                body: serde_json::json!({"scope": "360 ribbon"}),
                financial_snapshot: None,
            },
            Utc::now(),
        );
        doc.status = DocumentStatus::Approved;
        doc
    }

    fn signer() -> SignerPayload {
        SignerPayload {
            signer_email: "a@b.com".into(),
            signer_name: "A B".into(),
            signer_title: None,
            signer_role: SignerRole::Purchaser,
            ip_address: Some("1.2.3.4".into()),
            user_agent: None,
            auth_method: None,
        }
    }

    #[tokio::test]
    async fn second_commit_from_a_stale_read_is_a_conflict() {
        let repo = MemoryRepository::new();
        let doc = approved();
        repo.insert_document(&doc).await.unwrap();

        // Both writers read APPROVED and prepare independently.
        let first = prepare_signature(doc.status, &doc.content, &signer(), Utc::now()).unwrap();
        let second = prepare_signature(doc.status, &doc.content, &signer(), Utc::now()).unwrap();

        let signed = repo
            .commit_signature(
                doc.id,
                DocumentStatus::Approved,
                &first.lock,
                first.audit.clone().into_record(AuditRecordId::new(), doc.id),
            )
            .await
            .unwrap();
        assert_eq!(signed.status, DocumentStatus::Signed);

        let err = repo
            .commit_signature(
                doc.id,
                DocumentStatus::Approved,
                &second.lock,
                second.audit.into_record(AuditRecordId::new(), doc.id),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ConcurrentModification { .. }));
        assert_eq!(repo.audits_for(doc.id).await.unwrap().len(), 1);
        assert_eq!(
            repo.find_document(doc.id).await.unwrap().unwrap().locked_at,
            Some(first.lock.locked_at)
        );
    }

    #[tokio::test]
    async fn lock_over_edited_content_is_a_conflict() {
        let repo = MemoryRepository::new();
        let doc = approved();
        repo.insert_document(&doc).await.unwrap();

        // Signer hashes what they read; an editor then changes the body.
        let prepared = prepare_signature(doc.status, &doc.content, &signer(), Utc::now()).unwrap();
        let mut edited = doc.content.clone();
        edited.body = serde_json::json!({"price": 999999});
        repo.update_content(doc.id, DocumentStatus::Approved, &edited, Utc::now())
            .await
            .unwrap();

        let err = repo
            .commit_signature(
                doc.id,
                DocumentStatus::Approved,
                &prepared.lock,
                prepared.audit.into_record(AuditRecordId::new(), doc.id),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ConcurrentModification { .. }));

        let stored = repo.find_document(doc.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Approved);
        assert!(stored.document_hash.is_none());
        assert_eq!(stored.content.body, serde_json::json!({"price": 999999}));
        assert!(repo.audits_for(doc.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_cas_rejects_stale_expectation() {
        let repo = MemoryRepository::new();
        let doc = approved();
        repo.insert_document(&doc).await.unwrap();

        let err = repo
            .update_status(doc.id, DocumentStatus::Draft, DocumentStatus::PendingReview, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ConcurrentModification { .. }));

        let moved = repo
            .update_status(doc.id, DocumentStatus::Approved, DocumentStatus::Draft, Utc::now())
            .await
            .unwrap();
        assert_eq!(moved.status, DocumentStatus::Draft);
    }

    #[tokio::test]
    async fn locked_content_cannot_be_replaced() {
        let repo = MemoryRepository::new();
        let mut doc = approved();
        doc.status = DocumentStatus::Closed;
        doc.locked_at = Some(Utc::now());
        doc.document_hash = Some(doc.content.digest().unwrap());
        repo.insert_document(&doc).await.unwrap();

        let err = repo
            .update_content(doc.id, DocumentStatus::Closed, &doc.content, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyImmutable { .. }));
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let repo = MemoryRepository::new();
        let err = repo
            .update_status(DocumentId::new(), DocumentStatus::Draft, DocumentStatus::Cancelled, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paginated() {
        let repo = MemoryRepository::new();
        let base = Utc::now();
        for i in 0..5 {
            let mut doc = approved();
            doc.created_at = base + chrono::Duration::seconds(i);
            doc.content.title = format!("doc-{i}");
            repo.insert_document(&doc).await.unwrap();
        }
        let page = repo.list_documents(2, 1).await.unwrap();
        let titles: Vec<_> = page.iter().map(|d| d.content.title.as_str()).collect();
        assert_eq!(titles, vec!["doc-3", "doc-2"]);
    }
}
