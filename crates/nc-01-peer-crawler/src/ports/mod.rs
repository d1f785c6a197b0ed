//! # Driven Ports (Outbound SPI)
//!
//! What the crawling engine needs from its environment: a source of
//! candidates and a way to probe one.

use std::time::Duration;

use async_trait::async_trait;
use shared_types::NodeId;

use crate::domain::{Candidate, ProbeError, ProbeOutcome};

/// Continuous, restartable source of peers to probe.
///
/// # Thread Safety
///
/// Shared by every worker; implementations must tolerate concurrent calls.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Next candidate, or `None` if nothing is known right now. Callers
    /// back off briefly and ask again.
    async fn next_candidate(&self) -> Option<Candidate>;

    /// Peers learned from `from` during a probe.
    async fn report_neighbours(&self, from: &NodeId, neighbours: Vec<Candidate>);

    /// Up to `limit` known peers, shared with peers that probe us.
    async fn known_peers(&self, _limit: usize) -> Vec<Candidate> {
        Vec::new()
    }
}

/// Transport plus handshake used for one probe.
#[async_trait]
pub trait PeerSession: Send + Sync {
    /// Connect to `candidate` and run the status handshake.
    ///
    /// `timeout` is advisory for the implementation; the engine enforces it
    /// regardless.
    async fn dial(&self, candidate: &Candidate, timeout: Duration) -> Result<ProbeOutcome, ProbeError>;
}
