use std::time::Duration;

use parking_lot::Mutex;
use rocksdb::{ColumnFamily, IteratorMode, WriteBatch, DB};
use shared_types::{NodeId, PeerRecord, Timestamp};
use tracing::{debug, info};

use super::{backend_error, RocksDbConfig};
use crate::domain::{decode_record, encode_record, retention_cutoff, stage_upserts, StoreError, UpsertSummary};
use crate::ports::ServingStore;

const STORE_NAME: &str = "serving";
const CF_PEERS: &str = "peers";
const CF_LAST_SEEN: &str = "last_seen";

/// Read-optimized peer table on RocksDB.
pub struct RocksDbServingStore {
    db: DB,
    config: RocksDbConfig,
    /// Serializes read-modify-write cycles. Readers never take it.
    write_lock: Mutex<()>,
}

impl RocksDbServingStore {
    /// Open the serving table, creating it if missing.
    pub fn open(config: RocksDbConfig) -> Result<Self, StoreError> {
        let fresh = config.is_fresh();
        let db = config.open(STORE_NAME, &[CF_PEERS, CF_LAST_SEEN])?;
        if fresh {
            info!(path = %config.path.display(), "Initialized empty serving store");
        } else {
            debug!(path = %config.path.display(), "Opened serving store");
        }
        Ok(Self {
            db,
            config,
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily, StoreError> {
        self.db.cf_handle(name).ok_or_else(|| StoreError::Backend {
            store: STORE_NAME,
            message: format!("missing column family {}", name),
        })
    }

    fn load(&self, node_id: &NodeId) -> Result<Option<PeerRecord>, StoreError> {
        let cf = self.cf(CF_PEERS)?;
        match self
            .db
            .get_cf(cf, node_id.as_bytes())
            .map_err(|e| backend_error(STORE_NAME, "get", e))?
        {
            Some(bytes) => decode_record(node_id.as_bytes(), &bytes).map(Some),
            None => Ok(None),
        }
    }
}

fn index_key(last_seen: Timestamp, node_id: &NodeId) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..8].copy_from_slice(&last_seen.to_be_bytes());
    key[8..].copy_from_slice(node_id.as_bytes());
    key
}

fn parse_index_key(key: &[u8]) -> Result<(u64, NodeId), StoreError> {
    if key.len() != 40 {
        return Err(StoreError::Corrupted {
            key: hex::encode(key),
            reason: format!("index key is {} bytes, expected 40", key.len()),
        });
    }
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&key[..8]);
    let mut id = [0u8; 32];
    id.copy_from_slice(&key[8..]);
    Ok((u64::from_be_bytes(ts), NodeId::new(id)))
}

impl ServingStore for RocksDbServingStore {
    fn upsert_batch(&self, records: &[PeerRecord]) -> Result<UpsertSummary, StoreError> {
        let _guard = self.write_lock.lock();
        let (staged, summary) = stage_upserts(records, |id| self.load(id))?;

        let peers = self.cf(CF_PEERS)?;
        let index = self.cf(CF_LAST_SEEN)?;
        let mut batch = WriteBatch::default();
        for entry in &staged {
            let id = entry.merged.node_id;
            if let Some(previous) = &entry.previous {
                batch.delete_cf(index, index_key(previous.last_seen, &id));
            }
            batch.put_cf(index, index_key(entry.merged.last_seen, &id), b"");
            batch.put_cf(peers, id.as_bytes(), encode_record(&entry.merged)?);
        }

        self.db
            .write_opt(batch, &self.config.write_options())
            .map_err(|e| backend_error(STORE_NAME, "upsert", e))?;
        Ok(summary)
    }

    fn delete_older_than(&self, retention: Duration, now: Timestamp) -> Result<usize, StoreError> {
        let cutoff = retention_cutoff(now, retention).as_secs();
        let _guard = self.write_lock.lock();

        let peers = self.cf(CF_PEERS)?;
        let index = self.cf(CF_LAST_SEEN)?;
        let mut batch = WriteBatch::default();
        let mut removed = 0;

        for item in self.db.iterator_cf(index, IteratorMode::Start) {
            let (key, _) = item.map_err(|e| backend_error(STORE_NAME, "iterate", e))?;
            let (last_seen, node_id) = parse_index_key(&key)?;
            if last_seen >= cutoff {
                break;
            }
            batch.delete_cf(index, &key);
            batch.delete_cf(peers, node_id.as_bytes());
            removed += 1;
        }

        if removed > 0 {
            self.db
                .write_opt(batch, &self.config.write_options())
                .map_err(|e| backend_error(STORE_NAME, "evict", e))?;
        }
        Ok(removed)
    }

    fn get(&self, node_id: &NodeId) -> Result<Option<PeerRecord>, StoreError> {
        self.load(node_id)
    }

    fn len(&self) -> Result<usize, StoreError> {
        let cf = self.cf(CF_PEERS)?;
        let mut count = 0;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item.map_err(|e| backend_error(STORE_NAME, "iterate", e))?;
            count += 1;
        }
        Ok(count)
    }

    fn all(&self) -> Result<Vec<PeerRecord>, StoreError> {
        let cf = self.cf(CF_PEERS)?;
        self.db
            .iterator_cf(cf, IteratorMode::Start)
            .map(|item| {
                let (key, value) = item.map_err(|e| backend_error(STORE_NAME, "iterate", e))?;
                decode_record(&key, &value)
            })
            .collect()
    }
}
