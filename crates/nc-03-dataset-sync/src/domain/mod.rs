//! Domain layer: retry timing, error taxonomy and eviction policy.

mod backoff;
mod errors;
mod policy;

pub use backoff::Backoff;
pub use errors::{EvictionError, SyncError};
pub use policy::EvictionErrorPolicy;
