use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use fundbridge_core::ipfs::is_plausible_cid;
use fundbridge_types::api::{Claims, PinResponse};
use fundbridge_types::metadata::CampaignMetadata;

use crate::error::ApiError;
use crate::pinata::fetch_json;
use crate::state::AppState;

pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

fn pin_response(state: &AppState, cid: String) -> PinResponse {
    PinResponse {
        uri: format!("ipfs://{}", cid),
        gateway_url: format!("{}/ipfs/{}", state.ipfs_gateway.trim_end_matches('/'), cid),
        cid,
    }
}

pub async fn pin_metadata(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(metadata): Json<CampaignMetadata>,
) -> Result<impl IntoResponse, ApiError> {
    metadata
        .validate()
        .map_err(|problems| ApiError::bad_request(problems.join("; ")))?;

    let content = serde_json::to_value(&metadata).map_err(anyhow::Error::from)?;
    let name = format!("campaign-{}", metadata.basics.title.trim());
    let cid = state.pinata()?.pin_json(&name, &content).await?;
    info!(user = %claims.sub, %cid, "Campaign metadata pinned");

    Ok((StatusCode::CREATED, Json(pin_response(&state, cid))))
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub name: Option<String>,
}

pub async fn pin_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(q): Query<FileQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("file is empty"));
    }
    if body.len() > MAX_FILE_BYTES {
        return Err(ApiError::bad_request("file exceeds 10 MiB"));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let name = q
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty() && !n.contains(['/', '\\']))
        .unwrap_or_else(|| "upload".to_string());

    let cid = state.pinata()?.pin_file(&name, body.to_vec(), &content_type).await?;
    info!(user = %claims.sub, %cid, size = body.len(), "File pinned");

    Ok((StatusCode::CREATED, Json(pin_response(&state, cid))))
}

#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    pub cid: String,
    pub metadata: CampaignMetadata,
    /// Empty when the document passes validation.
    pub problems: Vec<String>,
}

pub async fn get_metadata(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> Result<Json<MetadataResponse>, ApiError> {
    if !is_plausible_cid(&cid) {
        return Err(ApiError::bad_request("not a valid IPFS CID"));
    }

    let raw = fetch_json(&state.http, &state.ipfs_gateway, &cid).await?;
    let metadata: CampaignMetadata = serde_json::from_value(raw)
        .map_err(|e| ApiError::bad_request(format!("document is not campaign metadata: {}", e)))?;
    let problems = metadata.validate().err().unwrap_or_default();

    Ok(Json(MetadataResponse {
        cid,
        metadata,
        problems,
    }))
}
