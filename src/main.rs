//! rtrelay — WebSocket fan-out relay server.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use rtrelay::config::{
    DEFAULT_EVICTING_PERIOD_SECONDS, DEFAULT_MAX_FRAME_SIZE, DEFAULT_SOCKET_TTL_MS, RelayConfig,
};
use rtrelay::server::Server;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// rtrelay — real-time WebSocket fan-out relay
#[derive(Parser, Debug)]
#[command(name = "rtrelay", version, about = "Real-time WebSocket fan-out relay")]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "RELAY_ADDR", default_value = "0.0.0.0:8080")]
    addr: SocketAddr,

    /// Seconds between eviction passes
    #[arg(long, env = "EVICTING_PERIOD_SECONDS", default_value_t = DEFAULT_EVICTING_PERIOD_SECONDS)]
    evicting_period_seconds: u64,

    /// Milliseconds without a heartbeat before a connection is evicted
    #[arg(long, env = "SOCKET_TTL", default_value_t = DEFAULT_SOCKET_TTL_MS)]
    socket_ttl: u64,

    /// Maximum concurrent connections (0 = unlimited)
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 0)]
    max_connections: usize,

    /// Largest inbound message accepted, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    max_frame_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn relay_config(&self) -> RelayConfig {
        RelayConfig::default()
            .bind(self.addr)
            .evicting_period(Duration::from_secs(self.evicting_period_seconds))
            .socket_ttl(Duration::from_millis(self.socket_ttl))
            .max_connections(self.max_connections)
            .max_frame_size(self.max_frame_size)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let config = cli.relay_config();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.bind_addr,
        evicting_period_secs = config.evicting_period.as_secs(),
        socket_ttl_ms = cli.socket_ttl,
        max_connections = config.max_connections,
        "starting rtrelay"
    );

    let server = Server::bind(config).await?;
    server.run_until(shutdown_signal()).await?;

    info!("rtrelay stopped");
    Ok(())
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
