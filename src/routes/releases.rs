use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{ReleaseNotification, SubjectKind};
use crate::error::AppResult;
use crate::services::fanout::{PreferencesInput, ReleaseSubject, ScheduleFailure};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(schedule_release))
        .route("/cancel", post(cancel_release))
}

#[derive(Debug, Deserialize)]
pub struct ScheduleReleaseRequest {
    /// When omitted, every user interested in the event is notified.
    pub user_id: Option<String>,
    pub event_id: String,
    pub subject: ReleaseSubject,
    pub release_at: DateTime<Utc>,
    #[serde(default)]
    pub preferences: PreferencesInput,
}

#[derive(Debug, Serialize)]
pub struct ScheduleReleaseResponse {
    pub scheduled: Vec<ReleaseNotification>,
    pub failures: Vec<ScheduleFailure>,
}

#[derive(Debug, Deserialize)]
pub struct CancelReleaseRequest {
    pub subject_kind: SubjectKind,
    pub subject_id: String,
}

#[derive(Debug, Serialize)]
pub struct CancelReleaseResponse {
    pub cancelled: u64,
}

async fn schedule_release(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScheduleReleaseRequest>,
) -> AppResult<(StatusCode, Json<ScheduleReleaseResponse>)> {
    let response = match req.user_id.as_deref() {
        Some(user_id) => {
            let entry = state
                .releases
                .schedule_release(
                    user_id,
                    &req.event_id,
                    &req.subject,
                    req.release_at,
                    &req.preferences,
                )
                .await?;
            ScheduleReleaseResponse {
                scheduled: vec![entry],
                failures: Vec::new(),
            }
        }
        None => {
            let report = state
                .releases
                .schedule_for_interested_users(
                    &req.event_id,
                    &req.subject,
                    req.release_at,
                    &req.preferences,
                )
                .await?;
            ScheduleReleaseResponse {
                scheduled: report.scheduled,
                failures: report.failures,
            }
        }
    };

    Ok((StatusCode::CREATED, Json(response)))
}

async fn cancel_release(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CancelReleaseRequest>,
) -> AppResult<Json<CancelReleaseResponse>> {
    let cancelled = state
        .releases
        .cancel_by_subject(req.subject_kind, &req.subject_id)
        .await?;
    Ok(Json(CancelReleaseResponse { cancelled }))
}
