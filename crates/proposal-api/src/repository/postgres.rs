//! PostgreSQL store via SQLx.
//!
//! Every conditional write runs in a transaction that first takes a row lock
//! (`SELECT ... FOR UPDATE`), checks the expected status, applies the move
//! through the lifecycle typestate and then issues an `UPDATE ... WHERE
//! status = $expected`. A signature commit inserts its audit record in the
//! same transaction, so a failed insert rolls the lock back.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgConnection, Postgres, Transaction};
use uuid::Uuid;

use proposal_core::{AuditRecordId, ContentDigest, DocumentId};
use proposal_state::{
    AnyProposal, AuthMethod, Document, DocumentContent, DocumentStatus, FinancialSnapshot,
    LifecycleError, LockPayload, ProposalView, SignatureAuditRecord, SignerRole,
};

use super::{ensure_hashed_content, AuditRepository, DocumentRepository, LifecycleStore};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only mode. \
                 Documents and signatures will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

const DOCUMENT_COLUMNS: &str = "id, status, locked_at, document_hash, parent_document_id, \
     version_number, title, body, financial_snapshot, share_token, created_at, updated_at";

const AUDIT_COLUMNS: &str = "id, document_id, signer_email, signer_name, signer_title, \
     signer_role, ip_address, user_agent, auth_method, document_hash, signed_at";

#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, LifecycleError> {
        self.pool.begin().await.map_err(persistence)
    }
}

fn persistence(err: sqlx::Error) -> LifecycleError {
    tracing::error!(error = %err, "database operation failed");
    LifecycleError::Persistence(err.to_string())
}

fn corrupt(what: impl std::fmt::Display) -> LifecycleError {
    tracing::error!(%what, "unreadable row in documents store");
    LifecycleError::Persistence(format!("unreadable row: {what}"))
}

/// Lock the row and check the CAS precondition.
async fn lock_row(
    conn: &mut PgConnection,
    id: DocumentId,
    expected: DocumentStatus,
) -> Result<Document, LifecycleError> {
    let row = sqlx::query_as::<_, DocumentRow>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 FOR UPDATE"
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut *conn)
    .await
    .map_err(persistence)?;

    let document = row
        .ok_or(LifecycleError::NotFound { document_id: id })?
        .into_document()?;
    if document.status != expected {
        return Err(LifecycleError::ConcurrentModification {
            document_id: id,
            expected,
        });
    }
    Ok(document)
}

/// Write back every mutable column, guarded by the expected status.
async fn write_row(
    conn: &mut PgConnection,
    expected: DocumentStatus,
    document: &Document,
) -> Result<(), LifecycleError> {
    let result = sqlx::query(
        "UPDATE documents SET
            status = $3,
            locked_at = $4,
            document_hash = $5,
            title = $6,
            body = $7,
            financial_snapshot = $8,
            updated_at = $9
         WHERE id = $1 AND status = $2",
    )
    .bind(document.id.as_uuid())
    .bind(expected.as_str())
    .bind(document.status.as_str())
    .bind(document.locked_at)
    .bind(document.document_hash.map(|h| h.to_hex()))
    .bind(&document.content.title)
    .bind(&document.content.body)
    .bind(document.content.financial_snapshot.as_ref().map(|s| &s.0))
    .bind(document.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(persistence)?;

    if result.rows_affected() == 0 {
        return Err(LifecycleError::ConcurrentModification {
            document_id: document.id,
            expected,
        });
    }
    Ok(())
}

impl DocumentRepository for PostgresRepository {
    async fn insert_document(&self, document: &Document) -> Result<(), LifecycleError> {
        let version = i32::try_from(document.version_number).map_err(corrupt)?;
        sqlx::query(
            "INSERT INTO documents (id, status, locked_at, document_hash, parent_document_id,
                version_number, title, body, financial_snapshot, share_token, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(document.id.as_uuid())
        .bind(document.status.as_str())
        .bind(document.locked_at)
        .bind(document.document_hash.map(|h| h.to_hex()))
        .bind(document.parent_document_id.map(|p| *p.as_uuid()))
        .bind(version)
        .bind(&document.content.title)
        .bind(&document.content.body)
        .bind(document.content.financial_snapshot.as_ref().map(|s| &s.0))
        .bind(&document.share_token)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn find_document(&self, id: DocumentId) -> Result<Option<Document>, LifecycleError> {
        sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?
        .map(DocumentRow::into_document)
        .transpose()
    }

    async fn list_documents(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Document>, LifecycleError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             ORDER BY created_at DESC, id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?
        .into_iter()
        .map(DocumentRow::into_document)
        .collect()
    }

    async fn all_documents(&self) -> Result<Vec<Document>, LifecycleError> {
        sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?
        .into_iter()
        .map(DocumentRow::into_document)
        .collect()
    }

    async fn update_content(
        &self,
        id: DocumentId,
        expected: DocumentStatus,
        content: &DocumentContent,
        updated_at: DateTime<Utc>,
    ) -> Result<Document, LifecycleError> {
        let mut tx = self.begin().await?;
        let current = lock_row(&mut tx, id, expected).await?;
        let updated = match AnyProposal::from_document(current).split() {
            ProposalView::Locked(locked) => return Err(locked.immutable_error()),
            ProposalView::Editable(mut editable) => {
                editable.replace_content(content.clone(), updated_at);
                editable.into_document()
            }
        };
        write_row(&mut tx, expected, &updated).await?;
        tx.commit().await.map_err(persistence)?;
        Ok(updated)
    }

    async fn update_status(
        &self,
        id: DocumentId,
        expected: DocumentStatus,
        target: DocumentStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Document, LifecycleError> {
        let mut tx = self.begin().await?;
        let current = lock_row(&mut tx, id, expected).await?;
        let updated = AnyProposal::from_document(current)
            .transition(target, updated_at)?
            .into_document();
        write_row(&mut tx, expected, &updated).await?;
        tx.commit().await.map_err(persistence)?;
        Ok(updated)
    }
}

impl AuditRepository for PostgresRepository {
    async fn audits_for(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<SignatureAuditRecord>, LifecycleError> {
        sqlx::query_as::<_, AuditRow>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM signature_audit_records
             WHERE document_id = $1 ORDER BY signed_at, id"
        ))
        .bind(document_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?
        .into_iter()
        .map(AuditRow::into_record)
        .collect()
    }

    async fn all_audits(&self) -> Result<Vec<SignatureAuditRecord>, LifecycleError> {
        sqlx::query_as::<_, AuditRow>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM signature_audit_records ORDER BY document_id, id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?
        .into_iter()
        .map(AuditRow::into_record)
        .collect()
    }
}

impl LifecycleStore for PostgresRepository {
    async fn commit_signature(
        &self,
        id: DocumentId,
        expected: DocumentStatus,
        lock: &LockPayload,
        audit: SignatureAuditRecord,
    ) -> Result<Document, LifecycleError> {
        let mut tx = self.begin().await?;
        let current = lock_row(&mut tx, id, expected).await?;
        ensure_hashed_content(&current, lock)?;
        let signed = AnyProposal::from_document(current).sign(lock)?.into_document();
        write_row(&mut tx, expected, &signed).await?;

        let inserted = sqlx::query(
            "INSERT INTO signature_audit_records (id, document_id, signer_email, signer_name,
                signer_title, signer_role, ip_address, user_agent, auth_method, document_hash, signed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(audit.id.as_uuid())
        .bind(audit.document_id.as_uuid())
        .bind(&audit.signer_email)
        .bind(&audit.signer_name)
        .bind(&audit.signer_title)
        .bind(audit.signer_role.as_str())
        .bind(&audit.ip_address)
        .bind(&audit.user_agent)
        .bind(audit.auth_method.as_str())
        .bind(audit.document_hash.to_hex())
        .bind(audit.signed_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            // A second signature for the same version lost the race.
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(LifecycleError::ConcurrentModification {
                    document_id: id,
                    expected,
                });
            }
            Err(err) => return Err(persistence(err)),
        }

        tx.commit().await.map_err(persistence)?;
        Ok(signed)
    }

    async fn ping(&self) -> Result<(), LifecycleError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(persistence)?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    status: String,
    locked_at: Option<DateTime<Utc>>,
    document_hash: Option<String>,
    parent_document_id: Option<Uuid>,
    version_number: i32,
    title: String,
    body: serde_json::Value,
    financial_snapshot: Option<serde_json::Value>,
    share_token: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document, LifecycleError> {
        let status = DocumentStatus::from_name(&self.status)
            .ok_or_else(|| corrupt(format!("document {} has status '{}'", self.id, self.status)))?;
        let document_hash = self
            .document_hash
            .as_deref()
            .map(ContentDigest::from_hex)
            .transpose()
            .map_err(|e| corrupt(format!("document {} hash: {e}", self.id)))?;
        let version_number = u32::try_from(self.version_number)
            .map_err(|e| corrupt(format!("document {} version: {e}", self.id)))?;

        Ok(Document {
            id: DocumentId::from_uuid(self.id),
            status,
            locked_at: self.locked_at,
            document_hash,
            parent_document_id: self.parent_document_id.map(DocumentId::from_uuid),
            version_number,
            content: DocumentContent {
                title: self.title,
                body: self.body,
                financial_snapshot: self.financial_snapshot.map(FinancialSnapshot),
            },
            share_token: self.share_token,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    document_id: Uuid,
    signer_email: String,
    signer_name: String,
    signer_title: Option<String>,
    signer_role: String,
    ip_address: String,
    user_agent: Option<String>,
    auth_method: String,
    document_hash: String,
    signed_at: DateTime<Utc>,
}

impl AuditRow {
    fn into_record(self) -> Result<SignatureAuditRecord, LifecycleError> {
        let signer_role = SignerRole::from_name(&self.signer_role)
            .ok_or_else(|| corrupt(format!("audit {} role '{}'", self.id, self.signer_role)))?;
        let auth_method = AuthMethod::from_name(&self.auth_method)
            .ok_or_else(|| corrupt(format!("audit {} auth '{}'", self.id, self.auth_method)))?;
        let document_hash = ContentDigest::from_hex(&self.document_hash)
            .map_err(|e| corrupt(format!("audit {} hash: {e}", self.id)))?;

        Ok(SignatureAuditRecord {
            id: AuditRecordId::from_uuid(self.id),
            document_id: DocumentId::from_uuid(self.document_id),
            signer_email: self.signer_email,
            signer_name: self.signer_name,
            signer_title: self.signer_title,
            signer_role,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            auth_method,
            document_hash,
            signed_at: self.signed_at,
        })
    }
}
