//! # Repository Contracts
//!
//! What the lifecycle requires of a transactional datastore, and the two
//! stores that provide it.
//!
//! Every write that changes `status` (and every content edit) is a
//! compare-and-swap on the expected prior status. A CAS that matches no row
//! reports [`LifecycleError::ConcurrentModification`] (or `NotFound` when the
//! row is gone) and is never retried here.
//!
//! [`LifecycleStore::commit_signature`] applies the document lock and
//! inserts the audit record as one unit: both become visible or neither does.
//! The lock also requires the stored content to still hash to the lock's
//! `documentHash`; an edit committed after the signer's read is a conflict.
//!
//! | Backend | Selected when | Atomic sign via |
//! |---|---|---|
//! | [`MemoryRepository`] | `DATABASE_URL` unset | one write lock over both tables |
//! | [`PostgresRepository`] | `DATABASE_URL` set | `BEGIN … COMMIT` |

pub mod memory;
pub mod postgres;

use std::future::Future;

use chrono::{DateTime, Utc};

use proposal_core::DocumentId;
use proposal_state::{
    Document, DocumentContent, DocumentStatus, LifecycleError, LockPayload, SignatureAuditRecord,
};

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// Refuse a lock whose hash was computed over content the row no longer holds.
pub(crate) fn ensure_hashed_content(
    current: &Document,
    lock: &LockPayload,
) -> Result<(), LifecycleError> {
    if current.content.digest()? != lock.document_hash {
        tracing::warn!(
            document_id = %current.id,
            "content changed between signer read and lock"
        );
        return Err(LifecycleError::ConcurrentModification {
            document_id: current.id,
            expected: current.status,
        });
    }
    Ok(())
}

/// Persists the document entity.
pub trait DocumentRepository: Send + Sync {
    fn insert_document(
        &self,
        document: &Document,
    ) -> impl Future<Output = Result<(), LifecycleError>> + Send;

    fn find_document(
        &self,
        id: DocumentId,
    ) -> impl Future<Output = Result<Option<Document>, LifecycleError>> + Send;

    /// Newest first.
    fn list_documents(
        &self,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<Document>, LifecycleError>> + Send;

    /// Full snapshot, for the reconciliation sweep.
    fn all_documents(&self) -> impl Future<Output = Result<Vec<Document>, LifecycleError>> + Send;

    /// Replace content, conditioned on `expected` still being the status.
    fn update_content(
        &self,
        id: DocumentId,
        expected: DocumentStatus,
        content: &DocumentContent,
        updated_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Document, LifecycleError>> + Send;

    /// Simple status write, conditioned on `expected` still being the status.
    fn update_status(
        &self,
        id: DocumentId,
        expected: DocumentStatus,
        target: DocumentStatus,
        updated_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Document, LifecycleError>> + Send;
}

/// Persists signature audit records. Append-only.
pub trait AuditRepository: Send + Sync {
    fn audits_for(
        &self,
        document_id: DocumentId,
    ) -> impl Future<Output = Result<Vec<SignatureAuditRecord>, LifecycleError>> + Send;

    fn all_audits(
        &self,
    ) -> impl Future<Output = Result<Vec<SignatureAuditRecord>, LifecycleError>> + Send;
}

/// A store where documents and audit records share one transaction.
pub trait LifecycleStore: DocumentRepository + AuditRepository + Clone + 'static {
    /// Lock the document (CAS on `expected`) and insert `audit` atomically.
    fn commit_signature(
        &self,
        id: DocumentId,
        expected: DocumentStatus,
        lock: &LockPayload,
        audit: SignatureAuditRecord,
    ) -> impl Future<Output = Result<Document, LifecycleError>> + Send;

    /// Cheap reachability probe for readiness checks.
    fn ping(&self) -> impl Future<Output = Result<(), LifecycleError>> + Send;
}

/// The configured backend.
#[derive(Debug, Clone)]
pub enum Repository {
    Memory(MemoryRepository),
    Postgres(PostgresRepository),
}

impl Repository {
    pub fn in_memory() -> Self {
        Self::Memory(MemoryRepository::new())
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Postgres(_) => "postgres",
        }
    }
}

impl DocumentRepository for Repository {
    async fn insert_document(&self, document: &Document) -> Result<(), LifecycleError> {
        match self {
            Self::Memory(r) => r.insert_document(document).await,
            Self::Postgres(r) => r.insert_document(document).await,
        }
    }

    async fn find_document(&self, id: DocumentId) -> Result<Option<Document>, LifecycleError> {
        match self {
            Self::Memory(r) => r.find_document(id).await,
            Self::Postgres(r) => r.find_document(id).await,
        }
    }

    async fn list_documents(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Document>, LifecycleError> {
        match self {
            Self::Memory(r) => r.list_documents(limit, offset).await,
            Self::Postgres(r) => r.list_documents(limit, offset).await,
        }
    }

    async fn all_documents(&self) -> Result<Vec<Document>, LifecycleError> {
        match self {
            Self::Memory(r) => r.all_documents().await,
            Self::Postgres(r) => r.all_documents().await,
        }
    }

    async fn update_content(
        &self,
        id: DocumentId,
        expected: DocumentStatus,
        content: &DocumentContent,
        updated_at: DateTime<Utc>,
    ) -> Result<Document, LifecycleError> {
        match self {
            Self::Memory(r) => r.update_content(id, expected, content, updated_at).await,
            Self::Postgres(r) => r.update_content(id, expected, content, updated_at).await,
        }
    }

    async fn update_status(
        &self,
        id: DocumentId,
        expected: DocumentStatus,
        target: DocumentStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Document, LifecycleError> {
        match self {
            Self::Memory(r) => r.update_status(id, expected, target, updated_at).await,
            Self::Postgres(r) => r.update_status(id, expected, target, updated_at).await,
        }
    }
}

impl AuditRepository for Repository {
    async fn audits_for(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<SignatureAuditRecord>, LifecycleError> {
        match self {
            Self::Memory(r) => r.audits_for(document_id).await,
            Self::Postgres(r) => r.audits_for(document_id).await,
        }
    }

    async fn all_audits(&self) -> Result<Vec<SignatureAuditRecord>, LifecycleError> {
        match self {
            Self::Memory(r) => r.all_audits().await,
            Self::Postgres(r) => r.all_audits().await,
        }
    }
}

impl LifecycleStore for Repository {
    async fn commit_signature(
        &self,
        id: DocumentId,
        expected: DocumentStatus,
        lock: &LockPayload,
        audit: SignatureAuditRecord,
    ) -> Result<Document, LifecycleError> {
        match self {
            Self::Memory(r) => r.commit_signature(id, expected, lock, audit).await,
            Self::Postgres(r) => r.commit_signature(id, expected, lock, audit).await,
        }
    }

    async fn ping(&self) -> Result<(), LifecycleError> {
        match self {
            Self::Memory(r) => r.ping().await,
            Self::Postgres(r) => r.ping().await,
        }
    }
}
