//! # Document Lifecycle API
//!
//! Create, edit, transition, sign and clone proposal documents, and read
//! back their audit trails and lineage. Handlers parse and shape; every
//! lifecycle decision is made by [`DocumentService`](crate::service::DocumentService).

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use proposal_core::DocumentId;
use proposal_state::{
    AuthMethod, Capabilities, Document, DocumentContent, DocumentStatus, FinancialSnapshot,
    SignatureAuditRecord, SignerPayload, SignerRole,
};

use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, ClientContext, Validate};
use crate::routes::PaginationParams;
use crate::service::LineageEntry;
use crate::state::AppState;

// ── Request DTOs ────────────────────────────────────────────────────

/// Content of a new or edited document.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContentRequest {
    pub title: String,
    /// Structured proposal fields. Defaults to `{}`.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub body: Option<serde_json::Value>,
    /// Opaque pricing snapshot; hashed but never interpreted.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub financial_snapshot: Option<serde_json::Value>,
}

impl Validate for DocumentContentRequest {
    fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must be non-empty".to_string());
        }
        if self.title.len() > 500 {
            return Err("title must not exceed 500 characters".to_string());
        }
        Ok(())
    }
}

impl DocumentContentRequest {
    fn into_content(self) -> DocumentContent {
        DocumentContent {
            title: self.title.trim().to_string(),
            body: self
                .body
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            financial_snapshot: self.financial_snapshot.map(FinancialSnapshot),
        }
    }
}

/// Request a simple status change.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    /// One of DRAFT, PENDING_REVIEW, APPROVED, CLOSED, CANCELLED.
    pub target_status: String,
}

impl TransitionRequest {
    fn target(&self) -> Result<DocumentStatus, AppError> {
        DocumentStatus::from_name(self.target_status.trim()).ok_or_else(|| {
            AppError::Validation(format!(
                "unknown status '{}' (valid: {})",
                self.target_status,
                DocumentStatus::ALL
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }
}

/// Signer data. Blank required fields are reported as `MISSING_FIELD`.
///
/// `ipAddress` and `userAgent` are taken from the connection when the server
/// observed them; body values are used only when it did not.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignDocumentRequest {
    #[serde(default)]
    pub signer_email: String,
    #[serde(default)]
    pub signer_name: String,
    #[serde(default)]
    pub signer_title: Option<String>,
    /// ANC_REPRESENTATIVE or PURCHASER.
    pub signer_role: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// EMAIL_LINK (default), SSO or MANUAL.
    #[serde(default)]
    pub auth_method: Option<String>,
}

impl Validate for SignDocumentRequest {
    fn validate(&self) -> Result<(), String> {
        if SignerRole::from_name(self.signer_role.trim()).is_none() {
            return Err(format!(
                "signerRole must be ANC_REPRESENTATIVE or PURCHASER, got '{}'",
                self.signer_role
            ));
        }
        if let Some(method) = &self.auth_method {
            if AuthMethod::from_name(method.trim()).is_none() {
                return Err(format!(
                    "authMethod must be EMAIL_LINK, SSO or MANUAL, got '{method}'"
                ));
            }
        }
        Ok(())
    }
}

impl SignDocumentRequest {
    /// Build the signer payload. Network facts from the connection win.
    fn into_payload(self, client: ClientContext) -> Result<SignerPayload, AppError> {
        let signer_role = SignerRole::from_name(self.signer_role.trim())
            .ok_or_else(|| AppError::Validation("invalid signerRole".to_string()))?;
        let auth_method = match self.auth_method {
            Some(raw) => Some(
                AuthMethod::from_name(raw.trim())
                    .ok_or_else(|| AppError::Validation("invalid authMethod".to_string()))?,
            ),
            None => None,
        };
        let non_blank = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        Ok(SignerPayload {
            signer_email: self.signer_email,
            signer_name: self.signer_name,
            signer_title: self.signer_title,
            signer_role,
            ip_address: if non_blank(&client.ip_address) {
                client.ip_address
            } else {
                self.ip_address
            },
            user_agent: if non_blank(&client.user_agent) {
                client.user_agent
            } else {
                self.user_agent
            },
            auth_method,
        })
    }
}

// ── Response DTOs ───────────────────────────────────────────────────

/// What the current status allows, derived from the transition table.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesResponse {
    pub can_edit: bool,
    pub can_sign: bool,
    pub can_close: bool,
    pub can_cancel: bool,
    pub next_statuses: Vec<String>,
}

impl From<Capabilities> for CapabilitiesResponse {
    fn from(c: Capabilities) -> Self {
        Self {
            can_edit: c.can_edit,
            can_sign: c.can_sign,
            can_close: c.can_close,
            can_cancel: c.can_cancel,
            next_statuses: c.next_statuses.iter().map(|s| s.as_str().to_string()).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: Uuid,
    pub status: String,
    /// Derived from `status`, never stored independently.
    pub is_locked: bool,
    pub locked_at: Option<DateTime<Utc>>,
    /// Lowercase hex SHA-256 of the canonical content, set at signing.
    pub document_hash: Option<String>,
    pub parent_document_id: Option<Uuid>,
    pub version_number: u32,
    pub title: String,
    #[schema(value_type = Object)]
    pub body: serde_json::Value,
    #[schema(value_type = Object)]
    pub financial_snapshot: Option<serde_json::Value>,
    pub share_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub capabilities: CapabilitiesResponse,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: *doc.id.as_uuid(),
            status: doc.status.as_str().to_string(),
            is_locked: doc.is_locked(),
            locked_at: doc.locked_at,
            document_hash: doc.document_hash.map(|h| h.to_hex()),
            parent_document_id: doc.parent_document_id.map(|p| *p.as_uuid()),
            version_number: doc.version_number,
            title: doc.content.title,
            body: doc.content.body,
            financial_snapshot: doc.content.financial_snapshot.map(|s| s.0),
            share_token: doc.share_token,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            capabilities: Capabilities::for_status(doc.status).into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignResponse {
    pub status: String,
    pub is_locked: bool,
    pub document_hash: String,
    pub signed_at: DateTime<Utc>,
    pub audit_record_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloneResponse {
    pub new_document_id: Uuid,
    pub new_version: u32,
    pub parent_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRecordResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub signer_email: String,
    pub signer_name: String,
    pub signer_title: Option<String>,
    pub signer_role: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub auth_method: String,
    pub document_hash: String,
    pub signed_at: DateTime<Utc>,
}

impl From<SignatureAuditRecord> for SignatureRecordResponse {
    fn from(r: SignatureAuditRecord) -> Self {
        Self {
            id: *r.id.as_uuid(),
            document_id: *r.document_id.as_uuid(),
            signer_email: r.signer_email,
            signer_name: r.signer_name,
            signer_title: r.signer_title,
            signer_role: r.signer_role.as_str().to_string(),
            ip_address: r.ip_address,
            user_agent: r.user_agent,
            auth_method: r.auth_method.as_str().to_string(),
            document_hash: r.document_hash.to_hex(),
            signed_at: r.signed_at,
        }
    }
}

/// One version of a lineage walk with its own signatures.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineageEntryResponse {
    pub document: DocumentResponse,
    pub signatures: Vec<SignatureRecordResponse>,
}

impl From<LineageEntry> for LineageEntryResponse {
    fn from(entry: LineageEntry) -> Self {
        Self {
            document: entry.document.into(),
            signatures: entry.signatures.into_iter().map(Into::into).collect(),
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the documents router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/documents", get(list_documents).post(create_document))
        .route("/v1/documents/{id}", get(get_document).patch(update_document))
        .route("/v1/documents/{id}/transition", put(transition_document))
        .route("/v1/documents/{id}/sign", post(sign_document))
        .route("/v1/documents/{id}/clone", post(clone_document))
        .route("/v1/documents/{id}/signatures", get(list_signatures))
        .route("/v1/documents/{id}/lineage", get(get_lineage))
}

/// POST /v1/documents: Create a version-1 draft.
#[utoipa::path(
    post,
    path = "/v1/documents",
    request_body = DocumentContentRequest,
    responses(
        (status = 201, description = "Draft created", body = DocumentResponse),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub(crate) async fn create_document(
    State(state): State<AppState>,
    body: Result<Json<DocumentContentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DocumentResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let document = state.service.create(req.into_content()).await?;
    Ok((StatusCode::CREATED, Json(document.into())))
}

/// GET /v1/documents: List documents, newest first.
#[utoipa::path(
    get,
    path = "/v1/documents",
    params(PaginationParams),
    responses(
        (status = 200, description = "Page of documents", body = Vec<DocumentResponse>),
    ),
    tag = "documents"
)]
pub(crate) async fn list_documents(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<Vec<DocumentResponse>>, AppError> {
    let page = state
        .service
        .list(pagination.effective_limit(), pagination.effective_offset())
        .await?;
    Ok(Json(page.into_iter().map(Into::into).collect()))
}

/// GET /v1/documents/{id}: Fetch a document with its capabilities.
#[utoipa::path(
    get,
    path = "/v1/documents/{id}",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document found", body = DocumentResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub(crate) async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentResponse>, AppError> {
    let document = state.service.get(DocumentId::from_uuid(id)).await?;
    Ok(Json(document.into()))
}

/// PATCH /v1/documents/{id}: Replace the content of an editable document.
#[utoipa::path(
    patch,
    path = "/v1/documents/{id}",
    params(("id" = Uuid, Path, description = "Document ID")),
    request_body = DocumentContentRequest,
    responses(
        (status = 200, description = "Content replaced", body = DocumentResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Locked or modified concurrently", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub(crate) async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<DocumentContentRequest>, JsonRejection>,
) -> Result<Json<DocumentResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let document = state
        .service
        .update_content(DocumentId::from_uuid(id), req.into_content())
        .await?;
    Ok(Json(document.into()))
}

/// PUT /v1/documents/{id}/transition: Simple status change.
///
/// `SIGNED` is refused here; documents enter it only through `/sign`.
#[utoipa::path(
    put,
    path = "/v1/documents/{id}/transition",
    params(("id" = Uuid, Path, description = "Document ID")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Transition applied", body = DocumentResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Invalid transition or conflict", body = crate::error::ErrorBody),
        (status = 422, description = "Unknown status", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub(crate) async fn transition_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Json<DocumentResponse>, AppError> {
    let req = extract_json(body)?;
    let target = req.target()?;
    let document = state
        .service
        .transition(DocumentId::from_uuid(id), target)
        .await?;
    Ok(Json(document.into()))
}

/// POST /v1/documents/{id}/sign: Sign and lock an approved document.
#[utoipa::path(
    post,
    path = "/v1/documents/{id}/sign",
    params(("id" = Uuid, Path, description = "Document ID")),
    request_body = SignDocumentRequest,
    responses(
        (status = 200, description = "Signed and locked", body = SignResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Invalid transition, already immutable, or conflict", body = crate::error::ErrorBody),
        (status = 422, description = "Missing signer field", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub(crate) async fn sign_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    client: ClientContext,
    body: Result<Json<SignDocumentRequest>, JsonRejection>,
) -> Result<Json<SignResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let signer = req.into_payload(client)?;
    let outcome = state
        .service
        .sign(DocumentId::from_uuid(id), &signer)
        .await?;
    Ok(Json(SignResponse {
        status: outcome.document.status.as_str().to_string(),
        is_locked: outcome.document.is_locked(),
        document_hash: outcome.audit.document_hash.to_hex(),
        signed_at: outcome.audit.signed_at,
        audit_record_id: *outcome.audit.id.as_uuid(),
    }))
}

/// POST /v1/documents/{id}/clone: Start the next version as a draft.
#[utoipa::path(
    post,
    path = "/v1/documents/{id}/clone",
    params(("id" = Uuid, Path, description = "Source document ID")),
    responses(
        (status = 201, description = "Clone created", body = CloneResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Clone policy refused the source", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub(crate) async fn clone_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<CloneResponse>), AppError> {
    let clone = state
        .service
        .clone_document(DocumentId::from_uuid(id))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CloneResponse {
            new_document_id: *clone.id.as_uuid(),
            new_version: clone.version_number,
            parent_id: id,
            status: clone.status.as_str().to_string(),
        }),
    ))
}

/// GET /v1/documents/{id}/signatures: This version's audit trail.
#[utoipa::path(
    get,
    path = "/v1/documents/{id}/signatures",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Audit records", body = Vec<SignatureRecordResponse>),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub(crate) async fn list_signatures(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SignatureRecordResponse>>, AppError> {
    let records = state.service.signatures(DocumentId::from_uuid(id)).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// GET /v1/documents/{id}/lineage: This version and its ancestors.
#[utoipa::path(
    get,
    path = "/v1/documents/{id}/lineage",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Newest version first", body = Vec<LineageEntryResponse>),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub(crate) async fn get_lineage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<LineageEntryResponse>>, AppError> {
    let chain = state.service.lineage(DocumentId::from_uuid(id)).await?;
    Ok(Json(chain.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_request() -> SignDocumentRequest {
        SignDocumentRequest {
            signer_email: "a@b.com".into(),
            signer_name: "A B".into(),
            signer_title: None,
            signer_role: "PURCHASER".into(),
            ip_address: None,
            user_agent: None,
            auth_method: None,
        }
    }

    #[test]
    fn content_request_requires_title() {
        let req = DocumentContentRequest {
            title: "   ".into(),
            body: None,
            financial_snapshot: None,
        };
        assert!(req.validate().unwrap_err().contains("title"));
    }

    #[test]
    fn content_request_defaults_body_to_object() {
        let content = DocumentContentRequest {
            title: " Scoreboard ".into(),
            body: None,
            financial_snapshot: None,
        }
        .into_content();
        assert_eq!(content.title, "Scoreboard");
        assert_eq!(content.body, serde_json::json!({}));
    }

    #[test]
    fn transition_request_parses_status_names() {
        let req = TransitionRequest {
            target_status: "PENDING_REVIEW".into(),
        };
        assert_eq!(req.target().unwrap(), DocumentStatus::PendingReview);

        let bad = TransitionRequest {
            target_status: "ARCHIVED".into(),
        };
        assert!(matches!(bad.target().unwrap_err(), AppError::Validation(_)));
    }

    #[test]
    fn sign_request_rejects_unknown_role_and_method() {
        let mut req = sign_request();
        req.signer_role = "WITNESS".into();
        assert!(req.validate().unwrap_err().contains("signerRole"));

        let mut req = sign_request();
        req.auth_method = Some("FAX".into());
        assert!(req.validate().unwrap_err().contains("authMethod"));
    }

    #[test]
    fn observed_network_facts_take_precedence() {
        let client = ClientContext {
            ip_address: Some("203.0.113.9".into()),
            user_agent: Some("curl/8.5".into()),
        };
        let payload = sign_request().into_payload(client.clone()).unwrap();
        assert_eq!(payload.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(payload.user_agent.as_deref(), Some("curl/8.5"));
        assert_eq!(payload.signer_role, SignerRole::Purchaser);

        let mut claimed = sign_request();
        claimed.ip_address = Some("198.51.100.1".into());
        claimed.user_agent = Some("spoofed/1.0".into());
        let payload = claimed.into_payload(client).unwrap();
        assert_eq!(payload.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(payload.user_agent.as_deref(), Some("curl/8.5"));
    }

    #[test]
    fn body_address_used_when_connection_has_none() {
        let mut req = sign_request();
        req.ip_address = Some("198.51.100.1".into());
        let payload = req.into_payload(ClientContext::default()).unwrap();
        assert_eq!(payload.ip_address.as_deref(), Some("198.51.100.1"));
    }

    #[test]
    fn document_response_derives_lock_and_capabilities() {
        let doc = Document::new_draft(
            DocumentContent {
                title: "Ribbon".into(),
                body: serde_json::json!({}),
                financial_snapshot: None,
            },
            Utc::now(),
        );
        let resp = DocumentResponse::from(doc);
        assert_eq!(resp.status, "DRAFT");
        assert!(!resp.is_locked);
        assert!(resp.capabilities.can_edit);
        assert!(!resp.capabilities.can_sign);
        assert!(resp.document_hash.is_none());
    }
}
