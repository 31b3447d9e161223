use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use fundbridge_chain::ChainError;
use fundbridge_core::records::AuditEntry;
use fundbridge_types::api::{AddAuditLogRequest, Claims, TxHashResponse};

use crate::error::ApiError;
use crate::state::AppState;

const MAX_ACTION_CHARS: usize = 64;
const MAX_DETAILS_CHARS: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
    pub action: Option<String>,
}

/// Newest entries first.
pub async fn list(State(state): State<AppState>, Query(q): Query<LogQuery>) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    let mut entries = state.contracts.audit_log().get_logs().await?;
    entries.reverse();

    if let Some(action) = q.action.as_deref().filter(|a| !a.is_empty()) {
        entries.retain(|e| e.action.eq_ignore_ascii_case(action));
    }
    if let Some(limit) = q.limit {
        entries.truncate(limit);
    }
    Ok(Json(entries))
}

pub async fn count(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let count = state.contracts.audit_log().get_count().await?;
    Ok(Json(json!({ "count": count })))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Json<AuditEntry>, ApiError> {
    let entry = state
        .contracts
        .audit_log()
        .get_log(id)
        .await
        .map_err(|e| not_found_on_revert(e, "audit entry"))?;
    Ok(Json(entry))
}

pub async fn add(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddAuditLogRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let action = req.action.trim();
    if action.is_empty() || action.chars().count() > MAX_ACTION_CHARS {
        return Err(ApiError::bad_request(format!("action must be 1 to {} characters", MAX_ACTION_CHARS)));
    }
    if req.details.chars().count() > MAX_DETAILS_CHARS {
        return Err(ApiError::bad_request(format!("details must be at most {} characters", MAX_DETAILS_CHARS)));
    }

    let log = state.contracts.audit_log();
    if !log.can_write() {
        return Err(ApiError::NotConfigured("Audit log signer"));
    }

    // The contract records the server account as actor, so keep the caller in the details.
    let details = format!("user={} {}", claims.sub, req.details.trim());
    let tx_hash = log.add_log(action, &details).await?;
    info!(user = %claims.sub, action, %tx_hash, "Audit entry submitted");

    Ok((StatusCode::CREATED, Json(TxHashResponse { tx_hash })))
}

/// Submits an entry in the background when a signing key is configured.
pub fn record(state: &AppState, action: &'static str, details: String) {
    if !state.contracts.audit_log().can_write() {
        debug!(action, "No audit log signer; skipping entry");
        return;
    }
    let state = state.clone();
    tokio::spawn(async move {
        match state.contracts.audit_log().add_log(action, &details).await {
            Ok(tx_hash) => debug!(action, %tx_hash, "Audit entry submitted"),
            Err(e) => warn!(action, "Failed to submit audit entry: {}", e),
        }
    });
}

/// A reverted read means the id does not exist on chain.
pub fn not_found_on_revert(e: ChainError, what: &str) -> ApiError {
    if e.is_revert() {
        ApiError::NotFound(format!("{} not found", what))
    } else {
        ApiError::Chain(e)
    }
}
