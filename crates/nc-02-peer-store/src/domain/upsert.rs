//! Upsert staging.
//!
//! Both serving-store adapters resolve a batch the same way: look up the
//! stored version of each identity, fold the batch into it with
//! [`PeerRecord::merge_observation`], and only then apply the result in one
//! atomic write. Duplicates inside a batch fold into each other.

use std::collections::HashMap;
use std::time::Duration;

use shared_types::{NodeId, PeerRecord, Timestamp};

use super::errors::StoreError;

/// Counts reported by a serving-store upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Identities that did not exist before.
    pub inserted: usize,
    /// Identities that were refreshed.
    pub updated: usize,
}

impl UpsertSummary {
    /// Total number of distinct identities written.
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

/// One resolved write: the stored version (if any) and the merged result.
#[derive(Debug, Clone)]
pub struct StagedUpsert {
    pub previous: Option<PeerRecord>,
    pub merged: PeerRecord,
}

/// Resolve `batch` against the store contents returned by `lookup`.
///
/// Returns one entry per distinct `NodeId`, in first-appearance order.
pub fn stage_upserts<F>(
    batch: &[PeerRecord],
    mut lookup: F,
) -> Result<(Vec<StagedUpsert>, UpsertSummary), StoreError>
where
    F: FnMut(&NodeId) -> Result<Option<PeerRecord>, StoreError>,
{
    let mut order: Vec<NodeId> = Vec::with_capacity(batch.len());
    let mut staged: HashMap<NodeId, StagedUpsert> = HashMap::with_capacity(batch.len());

    for record in batch {
        if let Some(entry) = staged.get_mut(&record.node_id) {
            entry.merged = PeerRecord::merge_observation(&entry.merged, record);
            continue;
        }

        let previous = lookup(&record.node_id)?;
        let merged = match &previous {
            Some(existing) => PeerRecord::merge_observation(existing, record),
            None => record.clone(),
        };
        order.push(record.node_id);
        staged.insert(record.node_id, StagedUpsert { previous, merged });
    }

    let mut summary = UpsertSummary::default();
    let mut resolved = Vec::with_capacity(order.len());
    for id in order {
        if let Some(entry) = staged.remove(&id) {
            if entry.previous.is_some() {
                summary.updated += 1;
            } else {
                summary.inserted += 1;
            }
            resolved.push(entry);
        }
    }

    Ok((resolved, summary))
}

/// Records with `last_seen` strictly before the returned timestamp are stale.
///
/// Retention is applied at whole-second granularity.
pub fn retention_cutoff(now: Timestamp, retention: Duration) -> Timestamp {
    now.sub_secs(retention.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::make_record;

    #[test]
    fn test_new_identities_are_inserted() {
        let batch = vec![make_record(1, 1, 100), make_record(2, 2, 100)];
        let (staged, summary) = stage_upserts(&batch, |_| Ok(None)).unwrap();

        assert_eq!(staged.len(), 2);
        assert_eq!(summary, UpsertSummary { inserted: 2, updated: 0 });
    }

    #[test]
    fn test_existing_identity_keeps_first_seen() {
        let mut stored = make_record(1, 1, 50);
        stored.first_seen = Timestamp::new(10);
        let incoming = make_record(1, 9, 100);

        let (staged, summary) =
            stage_upserts(&[incoming.clone()], |_| Ok(Some(stored.clone()))).unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(staged[0].merged.first_seen.as_secs(), 10);
        assert_eq!(staged[0].merged.address, incoming.address);
        assert_eq!(staged[0].previous.as_ref(), Some(&stored));
    }

    #[test]
    fn test_duplicates_in_batch_fold_together() {
        let batch = vec![make_record(1, 1, 100), make_record(1, 2, 200)];
        let mut lookups = 0;
        let (staged, summary) = stage_upserts(&batch, |_| {
            lookups += 1;
            Ok(None)
        })
        .unwrap();

        assert_eq!(lookups, 1);
        assert_eq!(staged.len(), 1);
        assert_eq!(summary.total(), 1);
        assert_eq!(staged[0].merged.last_seen.as_secs(), 200);
        assert_eq!(staged[0].merged.first_seen.as_secs(), 100);
    }

    #[test]
    fn test_lookup_error_aborts_staging() {
        let batch = vec![make_record(1, 1, 100)];
        let result = stage_upserts(&batch, |_| {
            Err(StoreError::Backend {
                store: "serving",
                message: "boom".into(),
            })
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_retention_cutoff() {
        let cutoff = retention_cutoff(Timestamp::new(1_000), Duration::from_secs(300));
        assert_eq!(cutoff.as_secs(), 700);
        let clamped = retention_cutoff(Timestamp::new(10), Duration::from_secs(300));
        assert_eq!(clamped.as_secs(), 0);
    }
}
