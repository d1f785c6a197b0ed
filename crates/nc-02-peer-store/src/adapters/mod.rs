//! Adapters Layer
//!
//! - `memory` - in-process stores used by tests and ephemeral crawls
//! - `rocksdb` - production stores (requires feature `rocksdb`)

pub mod memory;

#[cfg(feature = "rocksdb")]
pub mod rocksdb;

pub use memory::{InMemoryServingStore, InMemoryTransientStore};

#[cfg(feature = "rocksdb")]
pub use self::rocksdb::{RocksDbConfig, RocksDbServingStore, RocksDbTransientStore};
