use std::sync::Arc;
use std::time::Duration;

use crawler_telemetry::{BACKOFF_SECONDS, RECORDS_TRANSFERRED, SERVING_RECORDS, SYNC_FAILURES};
use nc_02_peer_store::{ServingStore, TransientStore};
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::transfer::transfer_pending;
use crate::domain::{Backoff, SyncError};

/// Synchronization daemon timing.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// First retry delay after a failed cycle (default: 1 minute)
    pub base_interval: Duration,
    /// Upper bound on the retry delay (default: 1 hour)
    pub max_backoff: Duration,
    /// Pause after a successful cycle (default: 1 second)
    pub idle_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(60),
            max_backoff: Duration::from_secs(60 * 60),
            idle_interval: Duration::from_secs(1),
        }
    }
}

/// What one cycle did and how long the daemon waits before the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A non-empty batch reached the serving store.
    Committed { transferred: usize },
    /// Nothing was pending.
    Idle,
    /// Nothing was removed; retry after `retry_in`.
    Failed { error: SyncError, retry_in: Duration },
}

/// Single control loop moving records from the transient store into the
/// serving store.
pub struct SyncDaemon {
    transient: Arc<dyn TransientStore>,
    serving: Arc<dyn ServingStore>,
    config: SyncConfig,
    backoff: Backoff,
}

impl SyncDaemon {
    pub fn new(
        transient: Arc<dyn TransientStore>,
        serving: Arc<dyn ServingStore>,
        config: SyncConfig,
    ) -> Self {
        let backoff = Backoff::new(config.base_interval, config.max_backoff);
        Self {
            transient,
            serving,
            config,
            backoff,
        }
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Run one transfer and update the backoff state.
    ///
    /// Store calls run on the blocking pool.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let transient = Arc::clone(&self.transient);
        let serving = Arc::clone(&self.serving);

        let result = tokio::task::spawn_blocking(move || transfer_pending(transient.as_ref(), serving.as_ref()))
            .await
            .unwrap_or_else(|e| Err(SyncError::Task(e.to_string())));

        match result {
            Ok(report) => {
                self.backoff.reset();
                BACKOFF_SECONDS.set(0.0);
                if report.transferred == 0 {
                    CycleOutcome::Idle
                } else {
                    RECORDS_TRANSFERRED.inc_by(report.transferred as u64);
                    CycleOutcome::Committed {
                        transferred: report.transferred,
                    }
                }
            }
            Err(error) => {
                let retry_in = self.backoff.on_failure();
                SYNC_FAILURES.with_label_values(&[error.cause()]).inc();
                BACKOFF_SECONDS.set(retry_in.as_secs_f64());
                error!(
                    err = %error,
                    retry_in_secs = retry_in.as_secs(),
                    failures = self.backoff.failures(),
                    "Failure in transferring new records"
                );
                CycleOutcome::Failed { error, retry_in }
            }
        }
    }

    /// Count the serving store once. Cycles then adjust the gauge by what
    /// they insert.
    async fn seed_serving_gauge(&self) {
        let serving = Arc::clone(&self.serving);
        match tokio::task::spawn_blocking(move || serving.len()).await {
            Ok(Ok(len)) => SERVING_RECORDS.set(len as i64),
            Ok(Err(e)) => debug!(err = %e, "Could not count serving records"),
            Err(e) => debug!(err = %e, "Could not count serving records"),
        }
    }

    /// Loop until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            base_interval_secs = self.config.base_interval.as_secs(),
            max_backoff_secs = self.config.max_backoff.as_secs(),
            "Synchronization daemon started"
        );

        self.seed_serving_gauge().await;

        while !*shutdown.borrow() {
            let delay = match self.run_cycle().await {
                CycleOutcome::Failed { retry_in, .. } => retry_in,
                _ => self.config.idle_interval,
            };

            if !pause(delay, &mut shutdown).await {
                break;
            }
        }

        debug!("Synchronization daemon stopped");
    }
}

/// Sleep for `delay`. Returns `false` as soon as shutdown is requested or its
/// sender is gone; other changes on the channel do not cut the sleep short.
async fn pause(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let wake = tokio::time::sleep(delay);
    tokio::pin!(wake);
    loop {
        tokio::select! {
            _ = &mut wake => return true,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return false;
                }
            }
        }
    }
}
