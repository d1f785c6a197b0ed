//! # Crawler Runtime Library
//!
//! Configuration, wiring and lifecycle of a crawler process. The binary in
//! `main.rs` adds telemetry and signal handling on top.

pub mod container;
pub mod runtime;

pub use container::{open_stores, ConfigError, CrawlerContainer, CrawlerNodeConfig, StorageBackend, Stores};
pub use runtime::CrawlerRuntime;
