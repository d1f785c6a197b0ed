//! # Crawler Container
//!
//! Builds every component from a [`CrawlerNodeConfig`] and holds them until
//! the runtime starts them.
//!
//! ## Build Order
//!
//! 1. Stores (serving store created on first open)
//! 2. Local identity
//! 3. Lookup table seeded from bootnodes
//! 4. Listener bind
//! 5. Session, engine and daemons

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, CrawlerNodeConfig, StorageBackend};
pub use subsystems::{open_stores, CrawlerContainer, Stores};
