//! # Peer Crawler
//!
//! Continuously discovers peers on a Kademlia-style overlay, probes each one
//! with a status handshake and appends the resulting [`PeerRecord`]s to the
//! transient store.
//!
//! ## Architecture
//!
//! - **Domain Layer:** local identity, candidates, status handshake rules,
//!   XOR distance, network presets
//! - **Ports Layer:** `DiscoverySource`, `PeerSession`
//! - **Adapters Layer:** `LookupSource`, `TcpStatusSession`, `Listener`
//! - **Service Layer:** `CrawlerEngine` worker pool
//!
//! ## Failure Isolation
//!
//! Every probe runs under a hard timeout and its errors stay inside the
//! worker. Only a bad node key or a failed listener bind is fatal.
//!
//! [`PeerRecord`]: shared_types::PeerRecord

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

/// Test doubles (MockPeerSession, VecDiscoverySource, fixtures).
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use adapters::{Listener, LookupConfig, LookupSource, TcpStatusSession};
pub use domain::{
    verify_challenge_response, verify_status, Candidate, CrawlerError, HandshakeConfig, LocalIdentity,
    Network, ProbeError, ProbeOutcome, RejectReason, StatusMessage,
};
pub use ports::{DiscoverySource, PeerSession};
pub use service::{CrawlStats, CrawlerConfig, CrawlerEngine, StatsSnapshot};
