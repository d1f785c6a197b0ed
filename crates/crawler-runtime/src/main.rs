//! # Peer Crawler
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging + metrics registry)
//! 2. Load configuration (defaults, `CRAWLER_CONFIG` file, environment)
//! 3. Open stores, derive identity, bind the listener
//! 4. Start engine, listener and both daemons
//! 5. Stop on Ctrl+C; exit non-zero if eviction failed fatally

use anyhow::{Context, Result};
use crawler_runtime::{CrawlerContainer, CrawlerNodeConfig, CrawlerRuntime};
use crawler_telemetry::{init_telemetry, TelemetryConfig};
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env())?;

    let config = CrawlerNodeConfig::load().context("loading configuration")?;
    info!(
        network = %config.network.network,
        workers = config.crawler.workers,
        listen_addr = %config.network.listen_addr,
        storage = ?config.storage.backend,
        "Configuration loaded"
    );

    let container = CrawlerContainer::build(&config).await?;
    let runtime = CrawlerRuntime::new(container);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => warn!(err = %e, "Failed to listen for Ctrl+C, shutting down"),
        }
        let _ = shutdown_tx.send(true);
    });

    runtime.run(shutdown_rx).await?;
    Ok(())
}
