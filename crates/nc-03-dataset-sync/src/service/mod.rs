//! Service layer: the transfer step and the two daemons built on it.

mod eviction;
mod sync;
mod transfer;


pub use eviction::{EvictionConfig, EvictionDaemon};
pub use sync::{CycleOutcome, SyncConfig, SyncDaemon};
pub use transfer::{transfer_pending, TransferReport};
