//! # Lookup Discovery Source
//!
//! A bounded table of known nodes walked in lookup rounds. Each round picks
//! a random target id and yields every known node ordered closest-first by
//! XOR distance to it. When a round is exhausted the next one starts, so the
//! sequence never ends while the table is non-empty.
//!
//! When the table is full a newcomer only replaces the entry farthest from
//! our own id, and only if it is closer.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::NodeId;
use tracing::{debug, trace};

use crate::domain::{sort_by_distance, xor_distance, Candidate};
use crate::ports::DiscoverySource;

/// Lookup table limits.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    /// Maximum number of known nodes (default: 4096)
    pub table_capacity: usize,
    /// Candidates yielded per round; 0 means the whole table (default: 0)
    pub round_size: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            table_capacity: 4096,
            round_size: 0,
        }
    }
}

#[derive(Debug, Default)]
struct LookupState {
    table: HashMap<NodeId, Candidate>,
    round: VecDeque<Candidate>,
    rounds_started: u64,
}

/// Discovery source backed by an in-memory node table.
#[derive(Debug)]
pub struct LookupSource {
    local_id: NodeId,
    config: LookupConfig,
    state: Mutex<LookupState>,
}

impl LookupSource {
    pub fn new(local_id: NodeId, config: LookupConfig) -> Self {
        Self {
            local_id,
            config,
            state: Mutex::new(LookupState::default()),
        }
    }

    /// Table seeded with bootnodes.
    pub fn with_bootnodes(local_id: NodeId, config: LookupConfig, bootnodes: Vec<Candidate>) -> Self {
        let source = Self::new(local_id, config);
        {
            let mut state = source.state.lock();
            for node in bootnodes {
                source.insert(&mut state, node);
            }
        }
        source
    }

    pub fn len(&self) -> usize {
        self.state.lock().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rounds_started(&self) -> u64 {
        self.state.lock().rounds_started
    }

    fn insert(&self, state: &mut LookupState, node: Candidate) -> bool {
        if node.node_id == self.local_id {
            return false;
        }
        if let Some(existing) = state.table.get_mut(&node.node_id) {
            existing.address = node.address;
            return false;
        }

        if state.table.len() >= self.config.table_capacity {
            let farthest = state
                .table
                .keys()
                .max_by_key(|id| xor_distance(id, &self.local_id))
                .copied();
            match farthest {
                Some(id) if xor_distance(&node.node_id, &self.local_id) < xor_distance(&id, &self.local_id) => {
                    state.table.remove(&id);
                }
                _ => return false,
            }
        }

        state.table.insert(node.node_id, node);
        true
    }

    fn start_round(&self, state: &mut LookupState) {
        let target = NodeId::new(rand::random());
        let nodes = self.round_for(&state.table, &target);

        state.rounds_started += 1;
        trace!(lookup_target = %target, size = nodes.len(), round = state.rounds_started, "Starting lookup round");
        state.round = nodes.into();
    }

    /// The known nodes closest-first to `target`, limited to `round_size`.
    fn round_for(&self, table: &HashMap<NodeId, Candidate>, target: &NodeId) -> Vec<Candidate> {
        let mut nodes: Vec<Candidate> = table.values().cloned().collect();
        sort_by_distance(&mut nodes, target);
        if self.config.round_size > 0 {
            nodes.truncate(self.config.round_size);
        }
        nodes
    }
}

#[async_trait]
impl DiscoverySource for LookupSource {
    async fn next_candidate(&self) -> Option<Candidate> {
        let mut state = self.state.lock();
        if state.round.is_empty() {
            if state.table.is_empty() {
                return None;
            }
            self.start_round(&mut state);
        }
        state.round.pop_front()
    }

    async fn report_neighbours(&self, from: &NodeId, neighbours: Vec<Candidate>) {
        let mut state = self.state.lock();
        let reported = neighbours.len();
        let added = neighbours
            .into_iter()
            .filter(|node| self.insert(&mut state, node.clone()))
            .count();
        if added > 0 {
            debug!(from = %from, reported, added, table = state.table.len(), "Learned neighbours");
        }
    }

    async fn known_peers(&self, limit: usize) -> Vec<Candidate> {
        let state = self.state.lock();
        let mut nodes: Vec<Candidate> = state.table.values().cloned().collect();
        sort_by_distance(&mut nodes, &self.local_id);
        nodes.truncate(limit);
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::NodeAddr;

    fn id(first: u8) -> NodeId {
        let mut bytes = [0u8; 32];
        bytes[0] = first;
        NodeId::new(bytes)
    }

    fn node(first: u8) -> Candidate {
        Candidate::new(id(first), NodeAddr::new("10.0.0.1".parse().unwrap(), 30303))
    }

    #[tokio::test]
    async fn test_empty_table_yields_nothing() {
        let source = LookupSource::new(id(0), LookupConfig::default());
        assert!(source.next_candidate().await.is_none());
    }

    #[tokio::test]
    async fn test_rounds_restart_forever() {
        let source = LookupSource::with_bootnodes(id(0), LookupConfig::default(), vec![node(1), node(2)]);

        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(source.next_candidate().await.unwrap().node_id);
        }

        assert_eq!(source.rounds_started(), 3);
        assert_eq!(seen.iter().filter(|n| **n == id(1)).count(), 3);
        assert_eq!(seen.iter().filter(|n| **n == id(2)).count(), 3);
    }

    #[test]
    fn test_round_is_ordered_by_distance_to_target() {
        let config = LookupConfig {
            table_capacity: 16,
            round_size: 3,
        };
        let source = LookupSource::with_bootnodes(
            id(0),
            config,
            vec![node(0x01), node(0x40), node(0x80), node(0xC0)],
        );

        let state = source.state.lock();
        let round = source.round_for(&state.table, &id(0xC1));
        let order: Vec<u8> = round.iter().map(|c| c.node_id.as_bytes()[0]).collect();
        assert_eq!(order, vec![0xC0, 0x80, 0x40]);
    }

    #[tokio::test]
    async fn test_neighbours_feed_the_table() {
        let source = LookupSource::new(id(0), LookupConfig::default());
        source.report_neighbours(&id(9), vec![node(1), node(2), node(0)]).await;

        // Our own id is never added.
        assert_eq!(source.len(), 2);
        assert!(source.next_candidate().await.is_some());
    }

    #[tokio::test]
    async fn test_full_table_keeps_closest_nodes() {
        let config = LookupConfig {
            table_capacity: 2,
            round_size: 0,
        };
        let source = LookupSource::with_bootnodes(id(0), config, vec![node(0x80), node(0x40)]);

        source.report_neighbours(&id(9), vec![node(0x01)]).await;
        source.report_neighbours(&id(9), vec![node(0xF0)]).await;

        let known: Vec<NodeId> = source.known_peers(10).await.iter().map(|c| c.node_id).collect();
        assert_eq!(known, vec![id(0x01), id(0x40)]);
    }
}
