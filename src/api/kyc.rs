/// KYC endpoints for account owners
use crate::{
    auth::AuthContext,
    context::AppContext,
    error::HubResult,
    kyc::{KycDocument, KycVerification},
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/kyc/documents", post(upload_document))
        .route("/api/kyc/documents/:id", get(download_document))
        .route("/api/kyc/submit", post(submit))
        .route("/api/kyc/status", get(status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadParams {
    document_type: String,
    file_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KycStatus {
    verification: Option<KycVerification>,
    documents: Vec<KycDocument>,
}

/// Binary upload; the body is the document content and the content-type
/// header carries its mime type.
async fn upload_document(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> HubResult<Json<KycDocument>> {
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let document = ctx
        .kyc_manager
        .upload_document(
            &auth.user_id,
            auth.role,
            auth.profile.state,
            &params.document_type,
            &params.file_name,
            mime_type,
            body.to_vec(),
        )
        .await?;

    Ok(Json(document))
}

async fn download_document(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(document_id): Path<String>,
) -> HubResult<impl IntoResponse> {
    let (document, data) = ctx
        .kyc_manager
        .document_content(&auth.user_id, auth.role, auth.profile.state, &document_id)
        .await?;

    let content_type = document
        .mime_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(([(header::CONTENT_TYPE, content_type)], data))
}

async fn submit(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> HubResult<Json<KycVerification>> {
    let verification = ctx
        .kyc_manager
        .submit(&auth.user_id, auth.role, auth.profile.state)
        .await?;

    Ok(Json(verification))
}

async fn status(State(ctx): State<AppContext>, auth: AuthContext) -> HubResult<Json<KycStatus>> {
    let verification = ctx.kyc_manager.latest_verification(&auth.user_id).await?;
    let documents = ctx.kyc_manager.list_documents(&auth.user_id).await?;

    Ok(Json(KycStatus {
        verification,
        documents,
    }))
}
