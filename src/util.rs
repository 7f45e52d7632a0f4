use std::net::{IpAddr, Ipv4Addr};

const INGEST_PORT: &str = "INGEST_PORT";

const DEFAULT_PORT: u16 = 8000;

pub fn get_default_port() -> u16 {
    DEFAULT_PORT
}

/// Port from `INGEST_PORT`, falling back to `fallback` when unset or unparsable
pub fn get_port(fallback: u16) -> u16 {
    let port_from_env = std::env::var(INGEST_PORT);
    port_from_env.map_or(fallback, |res| res.parse().unwrap_or(fallback))
}

const INGEST_ADDR: &str = "INGEST_ADDR";

pub const DEFAULT_ADDR: Ipv4Addr = Ipv4Addr::new(0, 0, 0, 0);

pub fn get_addr(fallback: IpAddr) -> IpAddr {
    let addr_from_env = std::env::var(INGEST_ADDR);
    addr_from_env.map_or(fallback, |res| res.parse().unwrap_or(fallback))
}

const INGEST_TOKEN: &str = "INGEST_TOKEN";

pub fn get_token() -> Option<String> {
    let token_from_env = std::env::var(INGEST_TOKEN);
    token_from_env.ok().filter(|token| !token.is_empty())
}

/// Best-effort local hostname
pub fn hostname() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string())
}

/// Resolve once the process receives Ctrl+C or, on unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
