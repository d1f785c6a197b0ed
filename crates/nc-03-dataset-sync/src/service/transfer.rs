use crawler_telemetry::SERVING_RECORDS;
use nc_02_peer_store::{ServingStore, TransientStore, UpsertSummary};
use tracing::info;

use crate::domain::SyncError;

/// Result of one committed transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Records drained from the transient store.
    pub transferred: usize,
    /// How the serving store absorbed them.
    pub summary: UpsertSummary,
}

/// Move every pending record from `transient` into `serving`.
///
/// The extraction is committed only after the upsert succeeded. On any
/// error the extraction is rolled back and nothing is removed.
pub fn transfer_pending(
    transient: &dyn TransientStore,
    serving: &dyn ServingStore,
) -> Result<TransferReport, SyncError> {
    let extraction = transient.begin_extraction().map_err(SyncError::Extraction)?;

    let records = extraction.records();
    let mut report = TransferReport {
        transferred: records.len(),
        ..Default::default()
    };

    if !records.is_empty() {
        match serving.upsert_batch(records) {
            Ok(summary) => {
                // Rows exist from here on, whether or not the commit lands.
                SERVING_RECORDS.add(summary.inserted as i64);
                report.summary = summary;
            }
            Err(e) => {
                extraction.rollback();
                return Err(SyncError::Upsert(e));
            }
        }
    }

    // Committing an empty extraction also clears entries the store could
    // not decode.
    extraction.commit().map_err(SyncError::Commit)?;

    if report.transferred > 0 {
        info!(
            len = report.transferred,
            inserted = report.summary.inserted,
            updated = report.summary.updated,
            "Records inserted"
        );
    }
    Ok(report)
}
