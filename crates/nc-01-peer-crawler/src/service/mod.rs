//! Service layer: the crawling engine.

mod engine;
mod stats;


pub use engine::{CrawlerConfig, CrawlerEngine};
pub use stats::{CrawlStats, StatsSnapshot};
