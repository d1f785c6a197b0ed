use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rocksdb::{IteratorMode, WriteBatch, DB};
use shared_types::PeerRecord;
use tracing::{debug, warn};

use super::{backend_error, RocksDbConfig};
use crate::domain::{decode_record, encode_record, StoreError};
use crate::ports::{Extraction, ExtractionLock, TransientStore};

const STORE_NAME: &str = "transient";
const CF_QUEUE: &str = "queue";

/// Append-only queue of observations on RocksDB.
pub struct RocksDbTransientStore {
    db: DB,
    config: RocksDbConfig,
    next_seq: AtomicU64,
    extracting: AtomicBool,
}

impl RocksDbTransientStore {
    /// Open or create the queue. The sequence counter resumes after the
    /// highest key already on disk.
    pub fn open(config: RocksDbConfig) -> Result<Self, StoreError> {
        let db = config.open(STORE_NAME, &[CF_QUEUE])?;

        let next_seq = {
            let cf = queue_cf(&db)?;
            match db.iterator_cf(cf, IteratorMode::End).next() {
                Some(Ok((key, _))) => seq_from_key(&key)?.saturating_add(1),
                Some(Err(e)) => return Err(backend_error(STORE_NAME, "iterate", e)),
                None => 0,
            }
        };
        debug!(path = %config.path.display(), next_seq, "Opened transient store");

        Ok(Self {
            db,
            config,
            next_seq: AtomicU64::new(next_seq),
            extracting: AtomicBool::new(false),
        })
    }
}

#[cfg(test)]
impl RocksDbTransientStore {
    /// Write `value` verbatim under queue key `seq`.
    pub(super) fn put_raw(&self, seq: u64, value: &[u8]) {
        let cf = queue_cf(&self.db).unwrap();
        self.db.put_cf(cf, seq.to_be_bytes(), value).unwrap();
    }
}

fn queue_cf(db: &DB) -> Result<&rocksdb::ColumnFamily, StoreError> {
    db.cf_handle(CF_QUEUE).ok_or_else(|| StoreError::Backend {
        store: STORE_NAME,
        message: format!("missing column family {}", CF_QUEUE),
    })
}

fn seq_from_key(key: &[u8]) -> Result<u64, StoreError> {
    let bytes: [u8; 8] = key.try_into().map_err(|_| StoreError::Corrupted {
        key: hex::encode(key),
        reason: "queue key is not 8 bytes".to_string(),
    })?;
    Ok(u64::from_be_bytes(bytes))
}

impl TransientStore for RocksDbTransientStore {
    fn append(&self, record: &PeerRecord) -> Result<(), StoreError> {
        let value = encode_record(record)?;
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let cf = queue_cf(&self.db)?;
        self.db
            .put_cf_opt(cf, seq.to_be_bytes(), value, &self.config.write_options())
            .map_err(|e| backend_error(STORE_NAME, "put", e))
    }

    fn begin_extraction(&self) -> Result<Box<dyn Extraction + '_>, StoreError> {
        let lock = ExtractionLock::try_acquire(&self.extracting, STORE_NAME)?;
        let cf = queue_cf(&self.db)?;

        let mut keys = Vec::new();
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| backend_error(STORE_NAME, "iterate", e))?;
            match decode_record(&key, &value) {
                Ok(record) => records.push(record),
                // Unreadable entries are dropped with the batch rather than
                // wedging every future extraction.
                Err(e) => warn!(error = %e, "Discarding corrupted transient entry"),
            }
            keys.push(key);
        }

        Ok(Box::new(RocksDbExtraction {
            store: self,
            keys,
            records,
            _lock: lock,
        }))
    }

    fn pending_count(&self) -> Result<usize, StoreError> {
        let cf = queue_cf(&self.db)?;
        let mut count = 0;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item.map_err(|e| backend_error(STORE_NAME, "iterate", e))?;
            count += 1;
        }
        Ok(count)
    }
}

struct RocksDbExtraction<'a> {
    store: &'a RocksDbTransientStore,
    keys: Vec<Box<[u8]>>,
    records: Vec<PeerRecord>,
    _lock: ExtractionLock<'a>,
}

impl Extraction for RocksDbExtraction<'_> {
    fn records(&self) -> &[PeerRecord] {
        &self.records
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let cf = queue_cf(&self.store.db)?;
        let mut batch = WriteBatch::default();
        for key in &self.keys {
            batch.delete_cf(cf, key);
        }
        self.store
            .db
            .write_opt(batch, &self.store.config.write_options())
            .map_err(|e| backend_error(STORE_NAME, "commit", e))
    }
}
