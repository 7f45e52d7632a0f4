//! Storage statistics endpoint

use axum::{Json, extract::State};

use crate::api::{
    error::ApiResult,
    state::ApiState,
    types::{ResponseStatus, StatsResponse},
};

/// GET /stats
///
/// Backend statistics and health, for operators
pub async fn get_stats(State(state): State<ApiState>) -> ApiResult<Json<StatsResponse>> {
    let storage = state.store.get_stats().await?;
    let health = state.store.health_check().await?;

    Ok(Json(StatsResponse {
        status: ResponseStatus::Success,
        timestamp: chrono::Utc::now().to_rfc3339(),
        started_at: state.started_at.to_rfc3339(),
        storage,
        storage_healthy: health.healthy,
    }))
}
