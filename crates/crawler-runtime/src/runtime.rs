//! Process lifecycle: start every component, wait for shutdown or a fatal
//! eviction error, then stop everything.

use std::sync::Arc;

use anyhow::{Context, Result};
use nc_01_peer_crawler::StatsSnapshot;
use tokio::sync::watch;
use tracing::{error, info};

use crate::container::CrawlerContainer;

/// Running crawler process.
pub struct CrawlerRuntime {
    container: CrawlerContainer,
}

impl CrawlerRuntime {
    pub fn new(container: CrawlerContainer) -> Self {
        Self { container }
    }

    pub fn container(&self) -> &CrawlerContainer {
        &self.container
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Returns the engine counters on a clean stop. A fatal eviction error
    /// stops every other component and is returned as `Err`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<StatsSnapshot> {
        let CrawlerContainer {
            listener,
            engine,
            sync,
            eviction,
            ..
        } = self.container;

        let (stop_tx, stop_rx) = watch::channel(false);
        let listener = tokio::spawn(listener.run(stop_rx.clone()));
        let engine = tokio::spawn(Arc::clone(&engine).run(stop_rx.clone()));
        let sync = tokio::spawn(sync.run(stop_rx.clone()));
        let mut eviction = tokio::spawn(eviction.run(stop_rx));
        info!("Crawler running");

        let early = tokio::select! {
            result = &mut eviction => Some(result),
            _ = wait_for_shutdown(&mut shutdown) => None,
        };
        info!("Stopping crawler components");
        // Receivers live in the spawned tasks; a send error only means they
        // already exited.
        let _ = stop_tx.send(true);

        let eviction_result = match early {
            Some(result) => result,
            None => eviction.await,
        };
        let stats = engine.await.context("crawler engine task")?;
        sync.await.context("synchronization task")?;
        listener.await.context("listener task")?;

        match eviction_result.context("eviction task")? {
            Ok(()) => {
                info!(attempted = stats.attempted, succeeded = stats.succeeded, "Crawler stopped");
                Ok(stats)
            }
            Err(e) => {
                error!(err = %e, "Eviction daemon failed, terminating");
                Err(anyhow::Error::new(e).context("eviction daemon stopped"))
            }
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
