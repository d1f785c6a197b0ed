use std::sync::Arc;
use std::time::Duration;

use crawler_telemetry::{PROBES, RECORDS_APPENDED};
use nc_02_peer_store::{StoreError, TransientStore};
use shared_types::{NodeId, PeerRecord, TimeSource};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::stats::{CrawlStats, StatsSnapshot};
use crate::domain::{Candidate, ProbeError};
use crate::ports::{DiscoverySource, PeerSession};

/// Worker pool settings.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Probes in flight at once (default: 16)
    pub workers: usize,
    /// Hard per-probe deadline covering dial and handshake (default: 10s)
    pub probe_timeout: Duration,
    /// Pause when the discovery source has nothing to offer (default: 1s)
    pub idle_delay: Duration,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 16,
            probe_timeout: Duration::from_secs(10),
            idle_delay: Duration::from_secs(1),
        }
    }
}

/// Bounded pool of probing workers.
///
/// Each worker pulls a candidate, probes it, appends the resulting record to
/// the transient store and immediately pulls the next one. A failed probe is
/// logged and counted; it never affects other workers.
pub struct CrawlerEngine {
    session: Arc<dyn PeerSession>,
    discovery: Arc<dyn DiscoverySource>,
    transient: Arc<dyn TransientStore>,
    clock: Arc<dyn TimeSource>,
    config: CrawlerConfig,
    stats: CrawlStats,
}

impl CrawlerEngine {
    pub fn new(
        session: Arc<dyn PeerSession>,
        discovery: Arc<dyn DiscoverySource>,
        transient: Arc<dyn TransientStore>,
        clock: Arc<dyn TimeSource>,
        config: CrawlerConfig,
    ) -> Self {
        Self {
            session,
            discovery,
            transient,
            clock,
            config,
            stats: CrawlStats::default(),
        }
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Probe one candidate and persist the observation.
    ///
    /// The whole dial and handshake is bounded by `probe_timeout`.
    pub async fn probe_one(&self, candidate: &Candidate) -> Result<PeerRecord, ProbeError> {
        self.stats.probe_started();
        let result = self.probe_inner(candidate).await;

        let timed_out = matches!(result, Err(ProbeError::Timeout(_)));
        self.stats.probe_finished(result.is_ok(), timed_out);
        match &result {
            Ok(_) => PROBES.with_label_values(&["ok"]).inc(),
            Err(e) => PROBES.with_label_values(&[e.label()]).inc(),
        }
        result
    }

    async fn probe_inner(&self, candidate: &Candidate) -> Result<PeerRecord, ProbeError> {
        let timeout = self.config.probe_timeout;
        let outcome = tokio::time::timeout(timeout, self.session.dial(candidate, timeout))
            .await
            .map_err(|_| ProbeError::Timeout(timeout))??;

        let actual = NodeId::from_public_key(&outcome.public_key);
        if actual != candidate.node_id {
            return Err(ProbeError::IdentityMismatch {
                expected: candidate.node_id,
                actual,
            });
        }

        if !outcome.neighbours.is_empty() {
            self.discovery
                .report_neighbours(&candidate.node_id, outcome.neighbours.clone())
                .await;
        }

        let address = outcome.record_address(candidate);
        let record = PeerRecord::observed(candidate.node_id, address, outcome.metadata, self.clock.now());

        let transient = Arc::clone(&self.transient);
        let to_store = record.clone();
        tokio::task::spawn_blocking(move || transient.append(&to_store))
            .await
            .map_err(|e| {
                ProbeError::Store(StoreError::Backend {
                    store: "transient",
                    message: e.to_string(),
                })
            })?
            .map_err(ProbeError::Store)?;

        RECORDS_APPENDED.inc();
        Ok(record)
    }

    /// Start exactly `workers` tasks and wait for all of them to stop.
    ///
    /// Workers check `shutdown` between probes, so in-flight probes finish
    /// (bounded by the probe timeout) before this returns.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> StatsSnapshot {
        info!(
            workers = self.config.workers,
            timeout_ms = self.config.probe_timeout.as_millis() as u64,
            "Crawler started"
        );

        let handles: Vec<JoinHandle<()>> = (0..self.config.workers)
            .map(|worker| {
                let engine = Arc::clone(&self);
                let shutdown = shutdown.clone();
                tokio::spawn(async move { engine.worker_loop(worker, shutdown).await })
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(err = %e, "Crawler worker panicked");
            }
        }

        let stats = self.stats();
        info!(
            attempted = stats.attempted,
            succeeded = stats.succeeded,
            failed = stats.failed,
            "Crawler stopped"
        );
        stats
    }

    async fn worker_loop(&self, worker: usize, mut shutdown: watch::Receiver<bool>) {
        while !*shutdown.borrow() {
            let next = tokio::select! {
                next = self.discovery.next_candidate() => next,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let Some(candidate) = next else {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.idle_delay) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                continue;
            };

            match self.probe_one(&candidate).await {
                Ok(record) => debug!(worker, node = %record.node_id, addr = %record.address, client = %record.metadata.client_id, "Probe succeeded"),
                Err(e) => debug!(worker, node = %candidate.node_id, addr = %candidate.address, err = %e, "Probe failed"),
            }
        }
    }
}
