use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{
    InAppNotification, NotificationStats, NotificationStatus, ReleaseKind, ReleaseNotification,
};
use crate::error::{AppError, AppResult};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/pending", get(list_pending))
        .route("/stats", get(get_notification_stats))
        .route("/inbox", get(get_inbox))
        .route("/:id/cancel", post(cancel_notification))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub user_id: Option<String>,
    pub status: Option<String>,
    pub release_kind: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct NotificationsListResponse {
    pub items: Vec<ReleaseNotification>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub event_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    pub user_id: Option<String>,
    pub limit: Option<i64>,
}

fn page_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 100)
}

fn required_user_id(user_id: Option<String>) -> AppResult<String> {
    user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("user_id is required".to_string()))
}

// ============================================================================
// Handlers
// ============================================================================

/// Release notifications of one user, newest first
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<Json<NotificationsListResponse>> {
    let user_id = required_user_id(query.user_id)?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<NotificationStatus>)
        .transpose()?;
    let release_kind = query
        .release_kind
        .as_deref()
        .map(str::parse::<ReleaseKind>)
        .transpose()?;
    let limit = page_limit(query.limit);
    let offset = query.offset.unwrap_or(0).max(0);

    let items = state
        .releases
        .list_for_user(&user_id, status, release_kind, limit, offset)
        .await?;

    Ok(Json(NotificationsListResponse {
        items,
        limit,
        offset,
    }))
}

/// Due entries still waiting for the scheduler
async fn list_pending(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<ReleaseNotification>>> {
    let items = state.releases.list_pending(page_limit(query.limit)).await?;
    Ok(Json(items))
}

async fn get_notification_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> AppResult<Json<NotificationStats>> {
    let stats = state.releases.stats(query.event_id.as_deref()).await?;
    Ok(Json(stats))
}

async fn get_inbox(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InboxQuery>,
) -> AppResult<Json<Vec<InAppNotification>>> {
    let user_id = required_user_id(query.user_id)?;
    let items = state
        .releases
        .inbox(&user_id, page_limit(query.limit))
        .await?;
    Ok(Json(items))
}

async fn cancel_notification(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<ReleaseNotification>> {
    let entry = state.releases.cancel(&id).await?;
    tracing::info!("Release notification {} cancelled", id);
    Ok(Json(entry))
}
