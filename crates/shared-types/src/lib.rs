//! # Shared Types Crate
//!
//! The peer record model exchanged between the crawling engine, the two
//! peer stores and the synchronization/eviction daemons.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: `PeerRecord` is defined once and stored as-is
//!   in both the transient and the serving store.
//! - **Identity is the key**: a record is keyed by its `NodeId`; address and
//!   metadata are mutable attributes of that identity.

pub mod entities;
pub mod errors;
pub mod time;

pub use entities::*;
pub use errors::*;
pub use time::*;
