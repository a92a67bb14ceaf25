//! # Integrity API
//!
//! Read-only endpoints that recompute fingerprints and sweep the store for
//! broken lock, audit and lineage invariants. They report; they never
//! repair.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use proposal_core::DocumentId;
use proposal_state::{IntegrityReport, ReconciliationFinding};

use crate::error::AppError;
use crate::routes::wire_name;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityResponse {
    pub document_id: Uuid,
    pub status: String,
    /// VERIFIED, MISMATCH, INCONSISTENT or UNSIGNED.
    pub verdict: String,
    pub violation: bool,
    pub stored_hash: Option<String>,
    pub computed_hash: String,
    pub audit_record_count: usize,
    pub audit_hashes_match: bool,
}

impl From<IntegrityReport> for IntegrityResponse {
    fn from(report: IntegrityReport) -> Self {
        Self {
            document_id: *report.document_id.as_uuid(),
            status: report.status.as_str().to_string(),
            verdict: wire_name(&report.verdict),
            violation: report.is_violation(),
            stored_hash: report.stored_hash.map(|h| h.to_hex()),
            computed_hash: report.computed_hash.to_hex(),
            audit_record_count: report.audit_record_count,
            audit_hashes_match: report.audit_hashes_match,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FindingResponse {
    pub kind: String,
    pub document_id: Uuid,
    pub audit_record_id: Option<Uuid>,
    pub detail: String,
}

impl From<ReconciliationFinding> for FindingResponse {
    fn from(f: ReconciliationFinding) -> Self {
        Self {
            kind: wire_name(&f.kind),
            document_id: *f.document_id.as_uuid(),
            audit_record_id: f.audit_record_id.map(|id| *id.as_uuid()),
            detail: f.detail,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResponse {
    pub clean: bool,
    pub findings: Vec<FindingResponse>,
}

/// Build the integrity router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/documents/{id}/integrity", get(verify_document))
        .route("/v1/integrity/reconciliation", get(reconciliation))
}

/// GET /v1/documents/{id}/integrity: Recompute and compare the content hash.
#[utoipa::path(
    get,
    path = "/v1/documents/{id}/integrity",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Integrity report", body = IntegrityResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "integrity"
)]
pub(crate) async fn verify_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<IntegrityResponse>, AppError> {
    let report = state.service.verify(DocumentId::from_uuid(id)).await?;
    Ok(Json(report.into()))
}

/// GET /v1/integrity/reconciliation: Sweep the whole store.
#[utoipa::path(
    get,
    path = "/v1/integrity/reconciliation",
    responses(
        (status = 200, description = "Reconciliation findings", body = ReconciliationResponse),
    ),
    tag = "integrity"
)]
pub(crate) async fn reconciliation(
    State(state): State<AppState>,
) -> Result<Json<ReconciliationResponse>, AppError> {
    let findings = state.service.reconcile().await?;
    Ok(Json(ReconciliationResponse {
        clean: findings.is_empty(),
        findings: findings.into_iter().map(Into::into).collect(),
    }))
}
