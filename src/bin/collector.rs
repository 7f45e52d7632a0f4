use anyhow::Context;
use clap::Parser;
use hostpulse::{
    config::read_collector_config, monitors::snapshot::SysinfoSource, scheduler::Scheduler,
    util::{get_token, shutdown_signal},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(about = "Collect host metrics, raise alerts and ship them to an ingestion endpoint")]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension)
    #[arg(short, long, value_name = "FILE", default_value = "collector.toml")]
    config: String,

    /// Run a single collection cycle and exit
    #[arg(long)]
    once: bool,

    /// Log at debug level regardless of the configured level
    #[arg(short, long)]
    verbose: bool,
}

fn init(level: LevelFilter) {
    let filter = filter::Targets::new().with_targets(vec![
        ("hostpulse", level),
        ("hostpulse_collector", level),
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

    let mut config = read_collector_config(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config))?;
    if config.endpoint.auth_token.is_none() {
        config.endpoint.auth_token = get_token();
    }

    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        config.log_level.parse().unwrap_or(LevelFilter::INFO)
    };
    init(level);
    trace!("started with args: {args:?}");

    let source = SysinfoSource::new(config.metrics.clone());
    let mut scheduler = Scheduler::from_config(source, &config)?;

    if args.once {
        let report = scheduler.run_once().await;
        if !report.is_success() {
            anyhow::bail!(
                "collection cycle failed: {}",
                report.error.as_deref().unwrap_or("metrics were not delivered")
            );
        }
        info!("collection cycle delivered to {}", config.endpoint.url);
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, finishing current cycle");
        signal_token.cancel();
    });

    let stats = scheduler.run(shutdown).await;
    info!(
        "collector exited: {} cycle(s), {} alert(s) fired, {} overrun(s)",
        stats.cycles, stats.alerts_fired, stats.overruns
    );

    Ok(())
}
