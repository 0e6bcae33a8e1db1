use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthData {
    pub status: String,
    pub database: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database are reachable", body = ApiResponse<HealthData>),
        (status = 503, description = "Database ping failed", body = ApiResponse<HealthData>),
    ),
    tag = "Health"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<HealthData>>) {
    let (code, status, database) = match state.orm.ping().await {
        Ok(()) => (StatusCode::OK, "ok", "up"),
        Err(err) => {
            tracing::warn!(error = %err, "database ping failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", "down")
        }
    };

    let data = HealthData {
        status: status.to_string(),
        database: database.to_string(),
    };
    (
        code,
        Json(ApiResponse::success("Health check", data, Some(Meta::empty()))),
    )
}
