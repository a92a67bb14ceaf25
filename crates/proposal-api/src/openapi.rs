//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI 3.1 spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Proposal Lifecycle API",
        version = "0.1.0",
        description = "Draft, review, sign, lock and version proposal documents with tamper-evident content hashes and an append-only signature audit trail."
    ),
    paths(
        // Documents
        crate::routes::documents::create_document,
        crate::routes::documents::list_documents,
        crate::routes::documents::get_document,
        crate::routes::documents::update_document,
        crate::routes::documents::transition_document,
        crate::routes::documents::sign_document,
        crate::routes::documents::clone_document,
        crate::routes::documents::list_signatures,
        crate::routes::documents::get_lineage,
        // Integrity
        crate::routes::integrity::verify_document,
        crate::routes::integrity::reconciliation,
    ),
    components(schemas(
        // Error types
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        // Document DTOs
        crate::routes::documents::DocumentContentRequest,
        crate::routes::documents::TransitionRequest,
        crate::routes::documents::SignDocumentRequest,
        crate::routes::documents::CapabilitiesResponse,
        crate::routes::documents::DocumentResponse,
        crate::routes::documents::SignResponse,
        crate::routes::documents::CloneResponse,
        crate::routes::documents::SignatureRecordResponse,
        crate::routes::documents::LineageEntryResponse,
        // Integrity DTOs
        crate::routes::integrity::IntegrityResponse,
        crate::routes::integrity::FindingResponse,
        crate::routes::integrity::ReconciliationResponse,
    )),
    tags(
        (name = "documents", description = "Proposal document lifecycle"),
        (name = "integrity", description = "Hash verification and reconciliation"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
