//! Read endpoints

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{DEFAULT_HOURS, MetricsResponse, ResponseStatus, SummaryResponse, WindowQuery},
};

/// `hours` must be a positive number; 24 when absent
pub(crate) fn window_hours(hours: Option<i64>) -> ApiResult<u32> {
    let hours = hours.unwrap_or(DEFAULT_HOURS);
    if hours <= 0 {
        return Err(ApiError::Validation(format!(
            "hours: must be greater than 0, got {hours}"
        )));
    }
    u32::try_from(hours)
        .map_err(|_| ApiError::Validation(format!("hours: value {hours} is too large")))
}

/// GET /metrics?hostname=&hours=
///
/// Newest rows first, capped at 1000
pub async fn get_metrics(
    State(state): State<ApiState>,
    query: Result<Query<WindowQuery>, QueryRejection>,
) -> ApiResult<Json<MetricsResponse>> {
    let Query(query) = query?;
    let hours = window_hours(query.hours)?;

    let metrics = state.store.recent(query.hostname.as_deref(), hours).await?;

    Ok(Json(MetricsResponse {
        status: ResponseStatus::Success,
        count: metrics.len(),
        metrics,
    }))
}

/// GET /metrics/summary?hostname=&hours=
pub async fn get_summary(
    State(state): State<ApiState>,
    query: Result<Query<WindowQuery>, QueryRejection>,
) -> ApiResult<Json<SummaryResponse>> {
    let Query(query) = query?;
    let hours = window_hours(query.hours)?;

    let summary = state.store.summary(query.hostname.as_deref(), hours).await?;

    Ok(Json(SummaryResponse {
        status: ResponseStatus::Success,
        summary,
        period_hours: hours,
        hostname: query.hostname,
    }))
}
