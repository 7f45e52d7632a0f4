use anyhow::Context;
use clap::Parser;
use hostpulse::{
    api::{ApiConfig, ApiState, spawn_api_server},
    config::{IngestConfig, read_ingest_config},
    storage::{RetentionTask, open_store},
    util::{get_addr, get_port, get_token, shutdown_signal},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(about = "Receive, validate and store metric snapshots over HTTP")]
struct Args {
    /// Config file, defaults are used when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Bind address, overrides the config and INGEST_ADDR
    #[arg(long)]
    host: Option<std::net::IpAddr>,

    /// Bind port, overrides the config and INGEST_PORT
    #[arg(short, long)]
    port: Option<u16>,
}

fn init(level: LevelFilter) {
    let filter = filter::Targets::new().with_targets(vec![
        ("hostpulse", level),
        ("hostpulse_ingest", level),
        ("tower_http", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => read_ingest_config(path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => IngestConfig::default(),
    };
    config.host = args.host.unwrap_or_else(|| get_addr(config.host));
    config.port = args.port.unwrap_or_else(|| get_port(config.port));
    if let Some(token) = get_token() {
        config.auth_token = Some(token);
    }

    init(config.log_level.parse().unwrap_or(LevelFilter::INFO));
    trace!("started with args: {args:?}");

    let store = open_store(&config.storage)
        .await
        .context("failed to open metric store")?;
    info!("storage ready: {}", store.get_stats().await?);

    let shutdown = CancellationToken::new();

    let retention = RetentionTask::new(
        store.clone(),
        config.storage.retention_days(),
        config.storage.cleanup_interval(),
    )
    .spawn(shutdown.clone());

    let server = spawn_api_server(
        ApiConfig::from(&config),
        ApiState::new(store.clone()),
        shutdown.clone(),
    )
    .await?;

    shutdown_signal().await;
    info!("shutdown signal received, draining connections");
    shutdown.cancel();

    if let Err(e) = server.handle.await {
        error!("API server task failed: {e}");
    }
    if let Err(e) = retention.await {
        error!("retention task failed: {e}");
    }

    store.close().await?;
    info!("ingestion service stopped");

    Ok(())
}
