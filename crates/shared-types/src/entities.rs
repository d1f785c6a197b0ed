//! # Core Entities
//!
//! Identity, address and metadata of an observed network participant.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::errors::TypeError;

/// 32-byte hash (genesis, head block).
pub type Hash = [u8; 32];

/// 256-bit node identifier derived from the node's public key.
///
/// `NodeId = keccak256(X || Y)` where `X || Y` is the uncompressed secp256k1
/// public key without its `0x04` prefix.
///
/// Equality is constant-time so identifiers cannot be recovered through
/// timing measurements.
// derived Hash is consistent with the manual PartialEq: equal bytes hash equally.
#[allow(clippy::derived_hash_with_manual_eq)]
#[derive(Clone, Copy, Hash, Serialize, Deserialize)]
pub struct NodeId(pub [u8; 32]);

impl PartialEq for NodeId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        let mut result = 0u8;
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            result |= a ^ b;
        }
        result == 0
    }
}

impl Eq for NodeId {}

impl NodeId {
    /// Create a NodeId from a raw 32-byte array.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the identifier from a 64-byte uncompressed public key.
    pub fn from_public_key(public_key: &[u8; 64]) -> Self {
        let digest = Keccak256::digest(public_key);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Underlying bytes, used for XOR distance and store keys.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lower-case hex without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// All-zero identifier.
    pub fn zero() -> Self {
        Self([0u8; 32])
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.to_hex())
    }
}

impl fmt::Display for NodeId {
    /// Abbreviated form for log lines: first and last four bytes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "{}..{}", &hex[..8], &hex[56..])
    }
}

impl FromStr for NodeId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hash(s).map(Self)
    }
}

/// Decode a 32-byte value from hex, with or without `0x` prefix.
pub fn decode_hash(s: &str) -> Result<Hash, TypeError> {
    let s = s.trim().trim_start_matches("0x");
    let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(TypeError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Network location of a peer.
///
/// The discovery port and the listening port may differ; the listening port
/// is only known once the peer has been probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddr {
    /// IP address (v4 or v6).
    pub ip: IpAddr,
    /// UDP discovery port.
    pub udp_port: u16,
    /// TCP listening port, if advertised.
    pub tcp_port: Option<u16>,
}

impl NodeAddr {
    /// Address with identical discovery and listening ports.
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            ip,
            udp_port: port,
            tcp_port: Some(port),
        }
    }

    /// Address known only from discovery.
    pub fn discovery_only(ip: IpAddr, udp_port: u16) -> Self {
        Self {
            ip,
            udp_port,
            tcp_port: None,
        }
    }

    /// Port used when dialing: the listening port when known.
    pub fn dial_port(&self) -> u16 {
        self.tcp_port.unwrap_or(self.udp_port)
    }

    /// Socket address used when dialing.
    pub fn dial_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.dial_port())
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tcp_port {
            Some(tcp) if tcp != self.udp_port => {
                write!(f, "{}?discport={}", SocketAddr::new(self.ip, tcp), self.udp_port)
            }
            _ => write!(f, "{}", SocketAddr::new(self.ip, self.udp_port)),
        }
    }
}

impl From<SocketAddr> for NodeAddr {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

/// Unix timestamp in seconds.
///
/// Values are clamped to `MAX_REASONABLE` so that a hostile peer cannot
/// push `u64::MAX` into comparisons used by eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Maximum reasonable timestamp (year 9999).
    pub const MAX_REASONABLE: u64 = 253_402_300_799;

    /// Create a new timestamp, clamping to MAX_REASONABLE.
    pub fn new(secs: u64) -> Self {
        Self(secs.min(Self::MAX_REASONABLE))
    }

    /// Get the underlying seconds value.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Add seconds to timestamp (saturating at MAX_REASONABLE).
    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs).min(Self::MAX_REASONABLE))
    }

    /// Subtract seconds from timestamp (saturating at 0).
    pub fn sub_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    /// Big-endian bytes; sorts the same way as the value.
    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

/// EIP-2124 fork identifier advertised in the status handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForkId {
    /// CRC32 of genesis hash and passed fork block numbers.
    pub hash: [u8; 4],
    /// Block number of the next scheduled fork (0 if none).
    pub next: u64,
}

impl ForkId {
    /// Create a new fork ID.
    pub fn new(hash: [u8; 4], next: u64) -> Self {
        Self { hash, next }
    }
}

/// A sub-protocol advertised by a peer, e.g. `eth/68`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capability {
    /// Protocol name.
    pub name: String,
    /// Protocol version.
    pub version: u32,
}

impl Capability {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// Metadata extracted from a peer's handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMetadata {
    /// Client identifier string, e.g. `Geth/v1.13.0-stable/linux-amd64/go1.21`.
    pub client_id: String,
    /// Supported sub-protocols.
    pub capabilities: Vec<Capability>,
    /// Base protocol version.
    pub protocol_version: u32,
    /// Network/chain selector advertised by the peer.
    pub network_id: u64,
    /// Genesis block hash advertised by the peer.
    pub genesis_hash: Hash,
    /// Fork identifier, if advertised.
    pub fork_id: Option<ForkId>,
    /// Head block hash, if advertised.
    pub head_hash: Option<Hash>,
    /// Any further handshake attributes.
    pub extra: BTreeMap<String, String>,
}

/// One observed network participant.
///
/// ## Invariants
///
/// - `node_id` is unique within a store.
/// - `first_seen <= last_seen`.
/// - Re-observing an identity refreshes address, metadata and `last_seen`
///   but never `first_seen` (see [`PeerRecord::merge_observation`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    /// Unique node identifier.
    pub node_id: NodeId,
    /// Last known address.
    pub address: NodeAddr,
    /// Handshake metadata from the last observation.
    pub metadata: PeerMetadata,
    /// First time this identity was observed.
    pub first_seen: Timestamp,
    /// Most recent observation.
    pub last_seen: Timestamp,
}

impl PeerRecord {
    /// A record for a single observation at `at`.
    pub fn observed(node_id: NodeId, address: NodeAddr, metadata: PeerMetadata, at: Timestamp) -> Self {
        Self {
            node_id,
            address,
            metadata,
            first_seen: at,
            last_seen: at,
        }
    }

    /// Upsert rule: fold `incoming` into `existing`.
    ///
    /// `first_seen` always comes from `existing`. Mutable fields are taken
    /// from whichever observation is newer; ties go to `incoming`.
    pub fn merge_observation(existing: &PeerRecord, incoming: &PeerRecord) -> PeerRecord {
        debug_assert_eq!(existing.node_id, incoming.node_id);
        let first_seen = existing.first_seen;
        if incoming.last_seen >= existing.last_seen {
            PeerRecord {
                first_seen,
                ..incoming.clone()
            }
        } else {
            PeerRecord {
                first_seen,
                ..existing.clone()
            }
        }
    }

    /// Age of the record relative to `now`, in seconds.
    pub fn age_secs(&self, now: Timestamp) -> u64 {
        now.as_secs().saturating_sub(self.last_seen.as_secs())
    }
}
