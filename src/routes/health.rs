use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub database: String,
}

/// Liveness plus a cheap database round trip.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database_ok = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();

    let response = HealthResponse {
        status: if database_ok { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        database: if database_ok { "ok" } else { "unavailable" }.to_string(),
    };

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}
