//! Test doubles for the crawler ports.
//!
//! Available with the `test-utils` feature flag.

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{Capability, NodeAddr, NodeId, PeerMetadata};

use crate::domain::{Candidate, ProbeError, ProbeOutcome};
use crate::ports::{DiscoverySource, PeerSession};

/// Fake public key for fixture `id`.
pub fn fixture_public_key(id: u8) -> [u8; 64] {
    [id; 64]
}

/// Candidate whose node id matches [`fixture_public_key`]`(id)`, at
/// `10.0.0.<id>:30303`.
pub fn fixture_candidate(id: u8) -> Candidate {
    Candidate::new(
        NodeId::from_public_key(&fixture_public_key(id)),
        NodeAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, id)), 30303),
    )
}

/// Successful outcome for fixture `id`.
pub fn fixture_outcome(id: u8) -> ProbeOutcome {
    ProbeOutcome {
        public_key: fixture_public_key(id),
        metadata: PeerMetadata {
            client_id: format!("Geth/v1.13.{}", id),
            capabilities: vec![Capability::new("eth", 68)],
            protocol_version: 5,
            network_id: 1,
            ..Default::default()
        },
        listen_port: Some(30303),
        neighbours: Vec::new(),
    }
}

/// Scripted response of [`MockPeerSession`] for one peer.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    Respond(ProbeOutcome),
    /// Respond after a delay.
    Delayed(Duration, ProbeOutcome),
    Fail(ProbeError),
    /// Never return.
    Hang,
}

/// Session answering from a script keyed by node id.
///
/// Unknown peers fail with [`ProbeError::Unreachable`].
#[derive(Debug, Default)]
pub struct MockPeerSession {
    script: Mutex<HashMap<NodeId, MockBehaviour>>,
    dials: AtomicUsize,
}

impl MockPeerSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, node_id: NodeId, behaviour: MockBehaviour) {
        self.script.lock().insert(node_id, behaviour);
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerSession for MockPeerSession {
    async fn dial(&self, candidate: &Candidate, _timeout: Duration) -> Result<ProbeOutcome, ProbeError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let behaviour = self.script.lock().get(&candidate.node_id).cloned();
        match behaviour {
            Some(MockBehaviour::Respond(outcome)) => Ok(outcome),
            Some(MockBehaviour::Delayed(delay, outcome)) => {
                tokio::time::sleep(delay).await;
                Ok(outcome)
            }
            Some(MockBehaviour::Fail(err)) => Err(err),
            Some(MockBehaviour::Hang) => std::future::pending().await,
            None => Err(ProbeError::Unreachable("not scripted".into())),
        }
    }
}

/// Discovery source over a fixed list.
///
/// With `cycle` set the list repeats forever, otherwise it is drained once.
#[derive(Debug, Default)]
pub struct VecDiscoverySource {
    queue: Mutex<VecDeque<Candidate>>,
    all: Vec<Candidate>,
    cycle: bool,
    reported: Mutex<Vec<Candidate>>,
}

impl VecDiscoverySource {
    pub fn once(candidates: Vec<Candidate>) -> Self {
        Self {
            queue: Mutex::new(candidates.iter().cloned().collect()),
            all: candidates,
            cycle: false,
            reported: Mutex::new(Vec::new()),
        }
    }

    pub fn cycling(candidates: Vec<Candidate>) -> Self {
        Self {
            cycle: true,
            ..Self::once(candidates)
        }
    }

    /// Every neighbour reported so far.
    pub fn reported(&self) -> Vec<Candidate> {
        self.reported.lock().clone()
    }
}

#[async_trait]
impl DiscoverySource for VecDiscoverySource {
    async fn next_candidate(&self) -> Option<Candidate> {
        let mut queue = self.queue.lock();
        if queue.is_empty() && self.cycle {
            queue.extend(self.all.iter().cloned());
        }
        queue.pop_front()
    }

    async fn report_neighbours(&self, _from: &NodeId, neighbours: Vec<Candidate>) {
        self.reported.lock().extend(neighbours);
    }

    async fn known_peers(&self, limit: usize) -> Vec<Candidate> {
        self.all.iter().take(limit).cloned().collect()
    }
}
