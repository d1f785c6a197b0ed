//! # Dataset Synchronization
//!
//! The two long-running control loops that own the serving store's writes:
//!
//! - **Synchronization daemon**: drains the transient store inside an
//!   extraction and upserts the batch into the serving store. The extraction
//!   is committed only after the upsert succeeded, so a failed cycle leaves
//!   every record pending. Failures back off exponentially.
//! - **Eviction daemon**: on a long fixed cadence, deletes serving records
//!   whose `last_seen` is older than the retention window.
//!
//! Delivery is at-least-once. Duplicates are harmless because serving-store
//! writes are upserts keyed by `NodeId`.
//!
//! ## Architecture
//!
//! - **Domain Layer:** `Backoff`, error types, `EvictionErrorPolicy`
//! - **Service Layer:** `transfer_pending`, `SyncDaemon`, `EvictionDaemon`
//!
//! ## Shutdown
//!
//! Both daemons watch a `tokio::sync::watch::Receiver<bool>`. Shutdown is
//! observed between cycles, so an in-flight transfer or delete always
//! completes.

pub mod domain;
pub mod service;

pub use domain::{Backoff, EvictionError, EvictionErrorPolicy, SyncError};
pub use service::{
    transfer_pending, CycleOutcome, EvictionConfig, EvictionDaemon, SyncConfig, SyncDaemon,
    TransferReport,
};
