use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use shared_types::PeerRecord;

use crate::domain::StoreError;
use crate::ports::{Extraction, ExtractionLock, TransientStore};

const STORE_NAME: &str = "transient";

/// In-memory transient queue keyed by a monotonically increasing sequence.
#[derive(Debug, Default)]
pub struct InMemoryTransientStore {
    queue: Mutex<BTreeMap<u64, PeerRecord>>,
    next_seq: AtomicU64,
    extracting: AtomicBool,
}

impl InMemoryTransientStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransientStore for InMemoryTransientStore {
    fn append(&self, record: &PeerRecord) -> Result<(), StoreError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.queue.lock().insert(seq, record.clone());
        Ok(())
    }

    fn begin_extraction(&self) -> Result<Box<dyn Extraction + '_>, StoreError> {
        let lock = ExtractionLock::try_acquire(&self.extracting, STORE_NAME)?;

        let queue = self.queue.lock();
        let seqs: Vec<u64> = queue.keys().copied().collect();
        let records: Vec<PeerRecord> = queue.values().cloned().collect();
        drop(queue);

        Ok(Box::new(MemoryExtraction {
            store: self,
            seqs,
            records,
            _lock: lock,
        }))
    }

    fn pending_count(&self) -> Result<usize, StoreError> {
        Ok(self.queue.lock().len())
    }
}

struct MemoryExtraction<'a> {
    store: &'a InMemoryTransientStore,
    seqs: Vec<u64>,
    records: Vec<PeerRecord>,
    _lock: ExtractionLock<'a>,
}

impl Extraction for MemoryExtraction<'_> {
    fn records(&self) -> &[PeerRecord] {
        &self.records
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut queue = self.store.queue.lock();
        for seq in &self.seqs {
            queue.remove(seq);
        }
        Ok(())
    }
}
