//! # Peer Record Stores
//!
//! The two datastores the crawler pipeline hands records through:
//!
//! - **Transient store**: write-optimized queue the crawling engine appends
//!   to. Drained by a single extractor inside an extraction transaction.
//! - **Serving store**: read-optimized table keyed by `NodeId`. Written by
//!   idempotent batch upserts and by age-based bulk deletes.
//!
//! ## Architecture
//!
//! - **Domain Layer:** error taxonomy, record codec, upsert staging
//! - **Ports Layer:** `TransientStore`, `Extraction`, `ServingStore`
//! - **Adapters Layer:** in-memory stores, RocksDB stores (feature `rocksdb`)
//!
//! ## Example
//!
//! ```rust
//! use nc_02_peer_store::{InMemoryTransientStore, TransientStore};
//!
//! let store = InMemoryTransientStore::new();
//! let extraction = store.begin_extraction().unwrap();
//! assert!(extraction.records().is_empty());
//! extraction.commit().unwrap();
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;

/// Test helpers (FlakyServingStore, record fixtures).
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use adapters::{InMemoryServingStore, InMemoryTransientStore};
pub use domain::{retention_cutoff, StoreError, UpsertSummary};
pub use ports::{Extraction, ExtractionLock, ServingStore, TransientStore};

#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbConfig, RocksDbServingStore, RocksDbTransientStore};
