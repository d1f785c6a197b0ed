use std::sync::Arc;
use std::time::Duration;

use crawler_telemetry::{RECORDS_EVICTED, SERVING_RECORDS};
use nc_02_peer_store::ServingStore;
use shared_types::TimeSource;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::{EvictionError, EvictionErrorPolicy};

/// Eviction daemon settings.
#[derive(Debug, Clone)]
pub struct EvictionConfig {
    /// Time between deletes (default: 10 minutes)
    pub interval: Duration,
    /// Records not seen for longer than this are removed (default: 24 hours)
    pub retention: Duration,
    /// Reaction to a failed delete (default: fatal)
    pub policy: EvictionErrorPolicy,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10 * 60),
            retention: Duration::from_secs(24 * 60 * 60),
            policy: EvictionErrorPolicy::Fatal,
        }
    }
}

/// Periodic age-based delete on the serving store.
pub struct EvictionDaemon {
    serving: Arc<dyn ServingStore>,
    clock: Arc<dyn TimeSource>,
    config: EvictionConfig,
}

impl EvictionDaemon {
    pub fn new(serving: Arc<dyn ServingStore>, clock: Arc<dyn TimeSource>, config: EvictionConfig) -> Self {
        Self {
            serving,
            clock,
            config,
        }
    }

    /// Delete every record older than the retention window right now.
    /// Returns how many were removed.
    pub async fn run_once(&self) -> Result<usize, EvictionError> {
        let serving = Arc::clone(&self.serving);
        let retention = self.config.retention;
        // Evaluated at delete time, so a record refreshed after the last
        // tick is judged by its new `last_seen`.
        let now = self.clock.now();

        let removed = tokio::task::spawn_blocking(move || serving.delete_older_than(retention, now))
            .await
            .map_err(|e| EvictionError::Task(e.to_string()))?
            .map_err(EvictionError::Store)?;

        RECORDS_EVICTED.inc_by(removed as u64);
        SERVING_RECORDS.sub(removed as i64);
        if removed > 0 {
            info!(removed, retention_secs = retention.as_secs(), "Dropped old records");
        } else {
            debug!("No records past retention");
        }
        Ok(removed)
    }

    /// Tick every `interval` until shutdown. The first delete happens one
    /// interval after start.
    ///
    /// Returns an error only when the policy treats a failure as fatal.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), EvictionError> {
        let mut ticker = interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.config.interval.as_secs(),
            retention_secs = self.config.retention.as_secs(),
            policy = ?self.config.policy,
            "Eviction daemon started"
        );

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            if let Err(e) = self.run_once().await {
                if self.config.policy.should_retry(&e) {
                    warn!(err = %e, "Eviction failed, retrying next tick");
                    continue;
                }
                error!(err = %e, "Eviction failed");
                return Err(e);
            }
        }

        debug!("Eviction daemon stopped");
        Ok(())
    }
}
