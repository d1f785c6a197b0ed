use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use shared_types::{NodeId, PeerRecord, Timestamp};

use crate::domain::{retention_cutoff, stage_upserts, StoreError, UpsertSummary};
use crate::ports::ServingStore;

/// In-memory serving table.
///
/// Writers take the write lock for the whole batch, so readers see either
/// none or all of an upsert or delete.
#[derive(Debug, Default)]
pub struct InMemoryServingStore {
    records: RwLock<HashMap<NodeId, PeerRecord>>,
}

impl InMemoryServingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ServingStore for InMemoryServingStore {
    fn upsert_batch(&self, records: &[PeerRecord]) -> Result<UpsertSummary, StoreError> {
        let mut table = self.records.write();
        let (staged, summary) = stage_upserts(records, |id| Ok(table.get(id).cloned()))?;
        for entry in staged {
            table.insert(entry.merged.node_id, entry.merged);
        }
        Ok(summary)
    }

    fn delete_older_than(&self, retention: Duration, now: Timestamp) -> Result<usize, StoreError> {
        let cutoff = retention_cutoff(now, retention);
        let mut table = self.records.write();
        let before = table.len();
        table.retain(|_, record| record.last_seen >= cutoff);
        Ok(before - table.len())
    }

    fn get(&self, node_id: &NodeId) -> Result<Option<PeerRecord>, StoreError> {
        Ok(self.records.read().get(node_id).cloned())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().len())
    }

    fn all(&self) -> Result<Vec<PeerRecord>, StoreError> {
        Ok(self.records.read().values().cloned().collect())
    }
}
