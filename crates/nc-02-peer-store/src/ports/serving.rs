//! Serving store contract.

use std::time::Duration;

use shared_types::{NodeId, PeerRecord, Timestamp};

use crate::domain::{StoreError, UpsertSummary};

/// Read-optimized table of peer records keyed by `NodeId`.
///
/// # Writers
///
/// Exactly two components write here: the synchronization daemon
/// (`upsert_batch`) and the eviction daemon (`delete_older_than`). Both
/// operations are atomic; readers never observe half of either.
pub trait ServingStore: Send + Sync {
    /// Insert or refresh every record in one atomic write.
    ///
    /// Idempotent and keyed by `node_id`: existing rows keep `first_seen`
    /// and take address, metadata and `last_seen` from the newer
    /// observation.
    fn upsert_batch(&self, records: &[PeerRecord]) -> Result<UpsertSummary, StoreError>;

    /// Delete every record whose `last_seen` is before `now - retention`.
    ///
    /// The predicate is evaluated at delete time. Returns the number of
    /// records removed.
    fn delete_older_than(&self, retention: Duration, now: Timestamp) -> Result<usize, StoreError>;

    /// Look up one record.
    fn get(&self, node_id: &NodeId) -> Result<Option<PeerRecord>, StoreError>;

    /// Number of records stored.
    fn len(&self) -> Result<usize, StoreError>;

    /// Whether the store holds no records.
    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Every record, in unspecified order.
    fn all(&self) -> Result<Vec<PeerRecord>, StoreError>;
}
