//! # Crawler Telemetry
//!
//! Observability for the peer crawler.
//!
//! - **Logging**: `tracing` subscriber with `EnvFilter`, human or JSON output
//! - **Metrics**: Prometheus counters and gauges in a process-wide registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crawler_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CRAWLER_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `CRAWLER_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `CRAWLER_SERVICE_NAME` | `peer-crawler` | Service name in the startup line |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    gather_metrics, register_metrics, BACKOFF_SECONDS, PROBES, RECORDS_APPENDED, RECORDS_EVICTED,
    RECORDS_TRANSFERRED, REGISTRY, SERVING_RECORDS, SYNC_FAILURES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Guard returned by [`init_telemetry`]. Hold it for the process lifetime.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Register metrics, then install the global subscriber.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    init_logging(&config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}
