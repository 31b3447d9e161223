use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use fundbridge_types::api::{Claims, CreateNotificationRequest, UnreadCountResponse};
use fundbridge_types::models::{Notification, NotificationKind};

use crate::error::ApiError;
use crate::state::{AppState, run_db};

const MAX_MESSAGE_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub unread_only: bool,
}

fn default_limit() -> u32 {
    50
}

pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(q): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let limit = q.limit.clamp(1, 200);
    let uid = claims.sub.to_string();
    let rows = run_db(&state, move |db| db.list_notifications(&uid, limit, q.unread_only)).await?;

    let notifications = rows
        .into_iter()
        .map(|r| r.into_notification())
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(notifications))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateNotificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = req.message.trim().to_string();
    if message.is_empty() || message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::bad_request(format!(
            "message must be 1 to {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    let id = Uuid::new_v4();
    let (nid, uid) = (id.to_string(), claims.sub.to_string());
    let link = req.link.filter(|l| !l.trim().is_empty());
    let kind = req.kind;
    let row = run_db(&state, move |db| {
        db.create_notification(&nid, &uid, kind, &message, link.as_deref())?;
        Ok(db.list_notifications(&uid, 1, false)?.into_iter().find(|r| r.id == nid))
    })
    .await?
    .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("notification {} vanished after insert", id)))?;

    Ok((StatusCode::CREATED, Json(row.into_notification()?)))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let uid = claims.sub.to_string();
    let unread = run_db(&state, move |db| db.unread_notification_count(&uid)).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let (nid, uid) = (id.to_string(), claims.sub.to_string());
    let updated = run_db(&state, move |db| db.mark_notification_read(&nid, &uid)).await?;
    if !updated {
        return Err(ApiError::NotFound("notification not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let updated = run_db(&state, move |db| db.mark_all_notifications_read(&uid)).await?;
    Ok(Json(json!({ "updated": updated })))
}

/// Best-effort notification from another handler. Failures are logged, never surfaced.
pub async fn notify(state: &AppState, user_id: Uuid, kind: NotificationKind, message: String, link: Option<String>) {
    let id = Uuid::new_v4().to_string();
    let uid = user_id.to_string();
    let result = run_db(state, move |db| db.create_notification(&id, &uid, kind, &message, link.as_deref())).await;
    if let Err(e) = result {
        warn!(user = %user_id, "Failed to store {} notification: {}", kind.as_str(), e);
    }
}
