//! Write endpoint

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use tracing::{debug, info, instrument};

use crate::IngestPayload;
use crate::api::{
    error::ApiResult,
    state::ApiState,
    types::{IngestResponse, ResponseStatus},
    validation::validate_payload,
};
use crate::delivery::IDEMPOTENCY_HEADER;

/// POST /ingest
///
/// Validates and stores one snapshot. Retried deliveries of the same snapshot
/// are stored as separate rows; the idempotency key is only logged.
#[instrument(skip_all)]
pub async fn ingest_metrics(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<IngestPayload>, JsonRejection>,
) -> ApiResult<Json<IngestResponse>> {
    let Json(payload) = payload?;
    validate_payload(&payload)?;

    if let Some(key) = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        debug!("idempotency key {key}");
    }

    let id = state.store.store(&payload).await?;
    info!("stored metrics for {} as row {id}", payload.hostname);

    Ok(Json(IngestResponse {
        status: ResponseStatus::Success,
        message: format!("Metrics stored for {}", payload.hostname),
        id,
    }))
}
