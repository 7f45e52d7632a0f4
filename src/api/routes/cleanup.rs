//! Manual retention sweep

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use tracing::{info, instrument};

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{CleanupQuery, CleanupResponse, DEFAULT_DAYS_TO_KEEP, ResponseStatus},
};

/// POST /cleanup?days_to_keep=
///
/// `days_to_keep = 0` removes every row ingested up to now
#[instrument(skip_all)]
pub async fn cleanup(
    State(state): State<ApiState>,
    query: Result<Query<CleanupQuery>, QueryRejection>,
) -> ApiResult<Json<CleanupResponse>> {
    let Query(query) = query?;
    let days = query.days_to_keep.unwrap_or(DEFAULT_DAYS_TO_KEEP);
    let days_kept = u32::try_from(days).map_err(|_| {
        ApiError::Validation(format!(
            "days_to_keep: must be between 0 and {}, got {days}",
            u32::MAX
        ))
    })?;

    let deleted_records = state.store.cleanup(days_kept).await?;
    info!("manual cleanup removed {deleted_records} records");

    Ok(Json(CleanupResponse {
        status: ResponseStatus::Success,
        deleted_records,
        days_kept,
    }))
}
