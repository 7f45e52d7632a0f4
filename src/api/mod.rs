//! HTTP ingestion service
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **MetricStore** trait object shared by all handlers
//! - **Bearer auth** on everything except `/health` when a token is configured
//!
//! ## Endpoints
//!
//! - `POST /ingest` - Validate and store one snapshot
//! - `GET /metrics` - Recent rows, optional `hostname` and `hours`
//! - `GET /metrics/summary` - Count, averages and maxima over the same window
//! - `POST /cleanup` - Delete rows older than `days_to_keep`
//! - `GET /stats` - Storage statistics
//! - `GET /health` - Liveness

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;
pub mod validation;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{
    CleanupResponse, HealthResponse, IngestResponse, MetricsResponse, StatsResponse,
    SummaryResponse,
};
pub use validation::{ValidationError, validate_payload};

use std::net::{IpAddr, SocketAddr};

use axum::{
    Router,
    routing::{get, post},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::IngestConfig;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8000")
    pub bind_addr: SocketAddr,

    /// Optional authentication token
    pub auth_token: Option<String>,

    /// Enable CORS for dashboard
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((crate::util::DEFAULT_ADDR, crate::util::get_default_port())),
            auth_token: None,
            enable_cors: true,
        }
    }
}

impl From<&IngestConfig> for ApiConfig {
    fn from(config: &IngestConfig) -> Self {
        Self {
            bind_addr: SocketAddr::new(config.host, config.port),
            auth_token: config.auth_token.clone(),
            enable_cors: config.enable_cors,
        }
    }
}

impl ApiConfig {
    pub fn with_bind(mut self, host: IpAddr, port: u16) -> Self {
        self.bind_addr = SocketAddr::new(host, port);
        self
    }
}

/// Build the router with all routes and layers
pub fn build_router(config: &ApiConfig, state: ApiState) -> Router {
    let mut protected = Router::new()
        .route("/ingest", post(routes::ingest::ingest_metrics))
        .route("/metrics", get(routes::metrics::get_metrics))
        .route("/metrics/summary", get(routes::metrics::get_summary))
        .route("/cleanup", post(routes::cleanup::cleanup))
        .route("/stats", get(routes::stats::get_stats));

    if let Some(token) = config.auth_token.clone() {
        protected = protected.route_layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::auth_middleware,
        ));
    }

    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// A running API server
pub struct ApiServer {
    pub addr: SocketAddr,
    pub handle: JoinHandle<()>,
}

/// Spawn the API server
///
/// Binds the listener, serves in a background task until `shutdown` is
/// cancelled, and returns the bound address.
pub async fn spawn_api_server(
    config: ApiConfig,
    state: ApiState,
    shutdown: CancellationToken,
) -> anyhow::Result<ApiServer> {
    info!("starting API server on {}", config.bind_addr);

    let app = build_router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
        {
            error!("API server error: {}", e);
        }
    });

    Ok(ApiServer { addr, handle })
}
