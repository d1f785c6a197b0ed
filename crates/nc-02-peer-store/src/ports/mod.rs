//! # Ports Layer
//!
//! Store contracts consumed by the crawling engine and the daemons.
//!
//! - `transient` - append + extraction transaction
//! - `serving` - idempotent upsert, age-based delete, read queries

pub mod serving;
pub mod transient;

pub use serving::ServingStore;
pub use transient::{Extraction, ExtractionLock, TransientStore};
