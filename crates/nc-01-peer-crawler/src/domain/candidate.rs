//! Probe targets and probe results.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use shared_types::{NodeAddr, NodeId, PeerMetadata};

use super::identity::parse_public_key;

/// A peer address to probe, as yielded by a discovery source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Expected identity. A peer answering with another key is rejected.
    pub node_id: NodeId,
    pub address: NodeAddr,
}

impl Candidate {
    pub fn new(node_id: NodeId, address: NodeAddr) -> Self {
        Self { node_id, address }
    }

    pub fn dial_addr(&self) -> SocketAddr {
        self.address.dial_addr()
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.node_id, self.address)
    }
}

/// Parses `enode://<128 hex pubkey>@<ip>:<tcp port>[?discport=<udp port>]`.
impl FromStr for Candidate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .trim()
            .strip_prefix("enode://")
            .ok_or_else(|| "missing enode:// scheme".to_string())?;
        let (key, host) = rest
            .split_once('@')
            .ok_or_else(|| "missing '@' separator".to_string())?;
        let public_key = parse_public_key(key).ok_or_else(|| "invalid public key".to_string())?;

        let (endpoint, query) = match host.split_once('?') {
            Some((endpoint, query)) => (endpoint, Some(query)),
            None => (host, None),
        };
        let socket: SocketAddr = endpoint
            .parse()
            .map_err(|e| format!("invalid endpoint {}: {}", endpoint, e))?;

        let udp_port = match query.and_then(|q| q.strip_prefix("discport=")) {
            Some(port) => port
                .parse::<u16>()
                .map_err(|e| format!("invalid discport: {}", e))?,
            None => socket.port(),
        };

        Ok(Self {
            node_id: NodeId::from_public_key(&public_key),
            address: NodeAddr {
                ip: socket.ip(),
                udp_port,
                tcp_port: Some(socket.port()),
            },
        })
    }
}

/// What a successful dial learned about the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Public key the peer advertised. Outbound dials only yield an outcome
    /// once the peer has signed our challenge with this key.
    pub public_key: [u8; 64],
    pub metadata: PeerMetadata,
    /// TCP port the peer says it listens on.
    pub listen_port: Option<u16>,
    /// Peers the remote side knows about.
    pub neighbours: Vec<Candidate>,
}

impl ProbeOutcome {
    /// Address to record for `candidate`: its IP and discovery port, with
    /// the listening port the peer advertised if any.
    pub fn record_address(&self, candidate: &Candidate) -> NodeAddr {
        NodeAddr {
            ip: candidate.address.ip,
            udp_port: candidate.address.udp_port,
            tcp_port: self.listen_port.or(candidate.address.tcp_port),
        }
    }
}

pub(crate) fn ip_is_dialable(ip: &IpAddr) -> bool {
    !ip.is_unspecified() && !ip.is_multicast()
}
