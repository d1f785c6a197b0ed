//! # RocksDB Stores
//!
//! Production implementations of both stores.
//!
//! ## Layout
//!
//! - transient: column family `queue`, key = append sequence (u64 BE)
//! - serving: column family `peers`, key = node id, value = bincode record
//! - serving: column family `last_seen`, key = last_seen (u64 BE) ++ node id,
//!   empty value; eviction range-scans it from the oldest entry
//!
//! Every mutation is a single `WriteBatch`, so a failure leaves the
//! database exactly as it was before the call.

mod config;
mod serving;
mod transient;

#[cfg(test)]
mod tests;

pub use config::RocksDbConfig;
pub use serving::RocksDbServingStore;
pub use transient::RocksDbTransientStore;

use crate::domain::StoreError;

pub(crate) fn backend_error(store: &'static str, action: &str, err: rocksdb::Error) -> StoreError {
    StoreError::Backend {
        store,
        message: format!("RocksDB {} failed: {}", action, err),
    }
}
