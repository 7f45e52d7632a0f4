//! Health check endpoint

use axum::Json;

use crate::api::types::{HealthResponse, ResponseStatus, SERVICE_NAME};

/// GET /health
///
/// Liveness only; does not touch the store
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: ResponseStatus::Healthy,
        timestamp: chrono::Utc::now().to_rfc3339(),
        service: SERVICE_NAME.to_string(),
    })
}
