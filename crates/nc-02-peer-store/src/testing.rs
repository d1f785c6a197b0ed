//! Fixtures and fault injection for store consumers.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use shared_types::{Capability, NodeAddr, NodeId, PeerMetadata, PeerRecord, Timestamp};

use crate::domain::{StoreError, UpsertSummary};
use crate::ports::{Extraction, ServingStore, TransientStore};

/// A record with identity `[id; 32]` at `10.0.0.<last_octet>:30303`,
/// first and last seen at `last_seen`.
pub fn make_record(id: u8, last_octet: u8, last_seen: u64) -> PeerRecord {
    let metadata = PeerMetadata {
        client_id: format!("test-client/{}", id),
        capabilities: vec![Capability::new("eth", 68)],
        protocol_version: 5,
        network_id: 1,
        ..Default::default()
    };
    PeerRecord::observed(
        NodeId::new([id; 32]),
        NodeAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet)), 30303),
        metadata,
        Timestamp::new(last_seen),
    )
}

/// Serving store wrapper that fails a configurable number of upserts.
///
/// Failures are injected before the inner store is touched, so a failed
/// call has no effect.
#[derive(Debug, Default)]
pub struct FlakyServingStore<S> {
    inner: S,
    failures_left: AtomicUsize,
    upsert_calls: AtomicUsize,
    fail_deletes: AtomicUsize,
    len_calls: AtomicUsize,
}

impl<S: ServingStore> FlakyServingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failures_left: AtomicUsize::new(0),
            upsert_calls: AtomicUsize::new(0),
            fail_deletes: AtomicUsize::new(0),
            len_calls: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` upserts.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` evictions.
    pub fn fail_next_deletes(&self, n: usize) {
        self.fail_deletes.store(n, Ordering::SeqCst);
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// How often the store was counted.
    pub fn len_calls(&self) -> usize {
        self.len_calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn injected(store: &'static str, operation: &str) -> StoreError {
    StoreError::Backend {
        store,
        message: format!("injected {} failure", operation),
    }
}

impl<S: ServingStore> ServingStore for FlakyServingStore<S> {
    fn upsert_batch(&self, records: &[PeerRecord]) -> Result<UpsertSummary, StoreError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failures_left) {
            return Err(injected("serving", "upsert"));
        }
        self.inner.upsert_batch(records)
    }

    fn delete_older_than(&self, retention: Duration, now: Timestamp) -> Result<usize, StoreError> {
        if take_one(&self.fail_deletes) {
            return Err(injected("serving", "delete"));
        }
        self.inner.delete_older_than(retention, now)
    }

    fn get(&self, node_id: &NodeId) -> Result<Option<PeerRecord>, StoreError> {
        self.inner.get(node_id)
    }

    fn len(&self) -> Result<usize, StoreError> {
        self.len_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.len()
    }

    fn all(&self) -> Result<Vec<PeerRecord>, StoreError> {
        self.inner.all()
    }
}

/// Transient store wrapper whose extraction commits can be made to fail.
///
/// A failed commit rolls the inner extraction back, so every entry of the
/// batch stays pending.
#[derive(Debug, Default)]
pub struct FlakyTransientStore<S> {
    inner: S,
    failed_commits: AtomicUsize,
    commit_calls: AtomicUsize,
}

impl<S: TransientStore> FlakyTransientStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failed_commits: AtomicUsize::new(0),
            commit_calls: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` extraction commits.
    pub fn fail_next_commits(&self, n: usize) {
        self.failed_commits.store(n, Ordering::SeqCst);
    }

    pub fn commit_calls(&self) -> usize {
        self.commit_calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: TransientStore> TransientStore for FlakyTransientStore<S> {
    fn append(&self, record: &PeerRecord) -> Result<(), StoreError> {
        self.inner.append(record)
    }

    fn begin_extraction(&self) -> Result<Box<dyn Extraction + '_>, StoreError> {
        Ok(Box::new(FlakyExtraction {
            inner: self.inner.begin_extraction()?,
            failures: &self.failed_commits,
            calls: &self.commit_calls,
        }))
    }

    fn pending_count(&self) -> Result<usize, StoreError> {
        self.inner.pending_count()
    }
}

struct FlakyExtraction<'a> {
    inner: Box<dyn Extraction + 'a>,
    failures: &'a AtomicUsize,
    calls: &'a AtomicUsize,
}

impl Extraction for FlakyExtraction<'_> {
    fn records(&self) -> &[PeerRecord] {
        self.inner.records()
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if take_one(self.failures) {
            self.inner.rollback();
            return Err(injected("transient", "commit"));
        }
        self.inner.commit()
    }

    fn rollback(self: Box<Self>) {
        self.inner.rollback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryServingStore, InMemoryTransientStore};

    #[test]
    fn test_flaky_store_fails_then_recovers() {
        let store = FlakyServingStore::new(InMemoryServingStore::new());
        store.fail_next(2);

        let batch = [make_record(1, 1, 10)];
        assert!(store.upsert_batch(&batch).is_err());
        assert!(store.upsert_batch(&batch).is_err());
        assert!(store.inner().is_empty().unwrap());

        assert_eq!(store.upsert_batch(&batch).unwrap().inserted, 1);
        assert_eq!(store.upsert_calls(), 3);
    }

    #[test]
    fn test_failed_commit_keeps_batch_pending() {
        let store = FlakyTransientStore::new(InMemoryTransientStore::new());
        store.append(&make_record(1, 1, 10)).unwrap();
        store.append(&make_record(2, 2, 10)).unwrap();
        store.fail_next_commits(1);

        let extraction = store.begin_extraction().unwrap();
        assert_eq!(extraction.records().len(), 2);
        assert!(extraction.commit().is_err());
        assert_eq!(store.pending_count().unwrap(), 2);

        let extraction = store.begin_extraction().unwrap();
        assert_eq!(extraction.records().len(), 2);
        extraction.commit().unwrap();
        assert_eq!(store.pending_count().unwrap(), 0);
        assert_eq!(store.commit_calls(), 2);
    }
}
