//! In-memory stores.
//!
//! Same contracts as the RocksDB adapters; atomicity comes from holding a
//! single `parking_lot` lock across each mutation.

mod serving;
mod transient;

pub use serving::InMemoryServingStore;
pub use transient::InMemoryTransientStore;
