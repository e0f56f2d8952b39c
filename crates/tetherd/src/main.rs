//! tether relay daemon.

use tether_server::{ServerConfig, metrics, start};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    let metrics_handle = metrics::install_recorder();

    let handle = start(config, Some(metrics_handle)).await?;
    info!(port = handle.port, "tether relay ready");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    handle.shutdown().await;

    Ok(())
}
