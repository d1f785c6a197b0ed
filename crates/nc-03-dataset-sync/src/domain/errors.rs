use nc_02_peer_store::StoreError;
use thiserror::Error;

/// Why a synchronization cycle failed.
///
/// Every variant leaves the transient store's pending entries in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The extraction could not be opened.
    #[error("error starting transaction to read records: {0}")]
    Extraction(StoreError),

    /// The serving-store upsert failed; the extraction was rolled back.
    #[error("error inserting records: {0}")]
    Upsert(StoreError),

    /// The serving store accepted the batch but the extraction did not commit.
    /// The batch will be delivered again.
    #[error("error committing transfer: {0}")]
    Commit(StoreError),

    #[error("sync task failed: {0}")]
    Task(String),
}

impl SyncError {
    /// Label used for the failure metric.
    pub fn cause(&self) -> &'static str {
        match self {
            SyncError::Extraction(e) if e.is_transient() => "contention",
            SyncError::Extraction(_) => "transient",
            SyncError::Upsert(_) => "serving",
            SyncError::Commit(_) => "commit",
            SyncError::Task(_) => "task",
        }
    }

    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            SyncError::Extraction(e) | SyncError::Upsert(e) | SyncError::Commit(e) => Some(e),
            SyncError::Task(_) => None,
        }
    }
}

/// Eviction failure. Fatal unless the configured policy says otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvictionError {
    #[error("error dropping old records: {0}")]
    Store(StoreError),

    #[error("eviction task failed: {0}")]
    Task(String),
}
