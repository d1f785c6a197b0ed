//! # Status Handshake
//!
//! Both sides exchange one newline-terminated JSON [`StatusMessage`]. The
//! dialer writes first and includes a random 32-byte `challenge`. The
//! listener verifies it and answers with its own status, carrying a
//! `signature` of that challenge made with the key behind its `pubkey`.
//!
//! ## Verification
//!
//! 1. Network id must match
//! 2. Genesis hash must match
//! 3. Protocol version must be within `[min, max]`
//! 4. Fork id must be compatible (EIP-2124 rules, when both sides advertise one)
//! 5. The advertised public key must be a valid secp256k1 point
//!
//! The dialer additionally checks the challenge signature with
//! [`verify_challenge_response`]. Without it anyone could claim a node id by
//! repeating that node's public key.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use shared_types::{decode_hash, Capability, ForkId, Hash, NodeAddr, NodeId, PeerMetadata};

use super::candidate::{ip_is_dialable, Candidate, ProbeOutcome};
use super::errors::ProbeError;
use super::identity::{parse_public_key, verify_challenge, LocalIdentity};
use super::network::Network;

/// Longest status line accepted, in bytes.
pub const MAX_STATUS_LINE: usize = 64 * 1024;

/// Most neighbours shared in, or accepted from, one status message.
pub const MAX_NEIGHBOURS: usize = 16;

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// A peer another node knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighbourEntry {
    pub node_id: String,
    pub ip: IpAddr,
    pub udp_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_port: Option<u16>,
}

impl NeighbourEntry {
    pub fn from_candidate(candidate: &Candidate) -> Self {
        Self {
            node_id: candidate.node_id.to_hex(),
            ip: candidate.address.ip,
            udp_port: candidate.address.udp_port,
            tcp_port: candidate.address.tcp_port,
        }
    }

    /// `None` for unparsable ids or undialable addresses.
    pub fn to_candidate(&self) -> Option<Candidate> {
        let node_id: NodeId = self.node_id.parse().ok()?;
        if !ip_is_dialable(&self.ip) || self.udp_port == 0 {
            return None;
        }
        Some(Candidate::new(
            node_id,
            NodeAddr {
                ip: self.ip,
                udp_port: self.udp_port,
                tcp_port: self.tcp_port,
            },
        ))
    }
}

/// The single message each side sends during a probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Uncompressed secp256k1 public key, 64 bytes hex, no prefix.
    pub pubkey: String,
    pub client_id: String,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    pub protocol_version: u32,
    pub network_id: u64,
    pub genesis_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_id: Option<ForkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    #[serde(default)]
    pub neighbours: Vec<NeighbourEntry>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
    /// Dialer only: 32 random bytes, hex, the listener must sign
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    /// Listener only: signature of the dialer's challenge, 64 bytes hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl StatusMessage {
    /// Our own status.
    pub fn local(
        identity: &LocalIdentity,
        config: &HandshakeConfig,
        listen_port: Option<u16>,
        neighbours: &[Candidate],
    ) -> Self {
        Self {
            pubkey: identity.public_key_hex(),
            client_id: config.client_id.clone(),
            capabilities: config.capabilities.clone(),
            protocol_version: config.protocol_version,
            network_id: config.network_id,
            genesis_hash: hex::encode(config.genesis_hash),
            fork_id: config.fork_id,
            head_hash: None,
            listen_port,
            neighbours: neighbours
                .iter()
                .take(MAX_NEIGHBOURS)
                .map(NeighbourEntry::from_candidate)
                .collect(),
            extra: BTreeMap::new(),
            challenge: None,
            signature: None,
        }
    }

    /// Attach the challenge the answering side must sign.
    pub fn with_challenge(mut self, challenge: &[u8; 32]) -> Self {
        self.challenge = Some(hex::encode(challenge));
        self
    }

    /// Sign the challenge carried by `theirs` with `identity`.
    pub fn answer_challenge(
        mut self,
        identity: &LocalIdentity,
        theirs: &StatusMessage,
    ) -> Result<Self, ProbeError> {
        let challenge = theirs
            .challenge_bytes()
            .ok_or_else(|| ProbeError::Protocol("status carries no valid challenge".into()))?;
        self.signature = Some(hex::encode(identity.sign_challenge(&challenge)));
        Ok(self)
    }

    fn challenge_bytes(&self) -> Option<[u8; 32]> {
        let bytes = hex::decode(self.challenge.as_deref()?).ok()?;
        bytes.try_into().ok()
    }

    /// JSON line including the trailing newline.
    pub fn encode_line(&self) -> Result<String, ProbeError> {
        let mut line = serde_json::to_string(self).map_err(|e| ProbeError::Protocol(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }

    pub fn decode_line(line: &str) -> Result<Self, ProbeError> {
        if line.len() > MAX_STATUS_LINE {
            return Err(ProbeError::Protocol(format!(
                "status line of {} bytes exceeds {}",
                line.len(),
                MAX_STATUS_LINE
            )));
        }
        serde_json::from_str(line.trim_end()).map_err(|e| ProbeError::Protocol(e.to_string()))
    }

    /// Convert a verified status into a probe outcome.
    pub fn into_outcome(self) -> Result<ProbeOutcome, ProbeError> {
        let public_key =
            parse_public_key(&self.pubkey).ok_or(ProbeError::Rejected(RejectReason::InvalidPublicKey))?;
        let genesis_hash =
            decode_hash(&self.genesis_hash).map_err(|e| ProbeError::Protocol(e.to_string()))?;
        let head_hash = match &self.head_hash {
            Some(hash) => Some(decode_hash(hash).map_err(|e| ProbeError::Protocol(e.to_string()))?),
            None => None,
        };

        let neighbours = self
            .neighbours
            .iter()
            .take(MAX_NEIGHBOURS)
            .filter_map(NeighbourEntry::to_candidate)
            .collect();

        Ok(ProbeOutcome {
            public_key,
            metadata: PeerMetadata {
                client_id: self.client_id,
                capabilities: self.capabilities,
                protocol_version: self.protocol_version,
                network_id: self.network_id,
                genesis_hash,
                fork_id: self.fork_id,
                head_hash,
                extra: self.extra,
            },
            listen_port: self.listen_port,
            neighbours,
        })
    }
}

// =============================================================================
// VERIFICATION
// =============================================================================

/// Reasons for rejecting a peer's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Different network id
    NetworkIdMismatch,
    /// Different genesis hash
    GenesisMismatch,
    /// Protocol version outside the accepted range
    ProtocolMismatch,
    /// Fork id incompatible with ours
    ForkDivergence,
    /// Public key is not a valid curve point
    InvalidPublicKey,
    /// Challenge signature missing or not made by the advertised key
    BadSignature,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkIdMismatch => write!(f, "network id mismatch"),
            Self::GenesisMismatch => write!(f, "genesis hash mismatch"),
            Self::ProtocolMismatch => write!(f, "unsupported protocol version"),
            Self::ForkDivergence => write!(f, "incompatible fork id"),
            Self::InvalidPublicKey => write!(f, "invalid public key"),
            Self::BadSignature => write!(f, "challenge signature does not match public key"),
        }
    }
}

/// What we advertise and what we accept.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    pub network_id: u64,
    pub genesis_hash: Hash,
    /// Our fork id. Fork compatibility is only checked when set.
    pub fork_id: Option<ForkId>,
    /// Chain height used by the fork rules.
    pub head_height: u64,
    pub min_protocol_version: u32,
    pub max_protocol_version: u32,
    pub protocol_version: u32,
    pub client_id: String,
    pub capabilities: Vec<Capability>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self::for_network(Network::Mainnet.network_id(), Network::Mainnet.genesis_hash())
    }
}

impl HandshakeConfig {
    pub fn for_network(network_id: u64, genesis_hash: Hash) -> Self {
        Self {
            network_id,
            genesis_hash,
            fork_id: None,
            head_height: 0,
            min_protocol_version: 4,
            max_protocol_version: 5,
            protocol_version: 5,
            client_id: format!("peer-crawler/v{}", env!("CARGO_PKG_VERSION")),
            capabilities: vec![Capability::new("eth", 68)],
        }
    }
}

/// Verify a peer's status against our configuration.
pub fn verify_status(config: &HandshakeConfig, theirs: &StatusMessage) -> Result<(), RejectReason> {
    if theirs.network_id != config.network_id {
        return Err(RejectReason::NetworkIdMismatch);
    }

    match decode_hash(&theirs.genesis_hash) {
        Ok(genesis) if genesis == config.genesis_hash => {}
        _ => return Err(RejectReason::GenesisMismatch),
    }

    if theirs.protocol_version < config.min_protocol_version
        || theirs.protocol_version > config.max_protocol_version
    {
        return Err(RejectReason::ProtocolMismatch);
    }

    if let (Some(ours), Some(remote)) = (&config.fork_id, &theirs.fork_id) {
        if !is_fork_compatible(ours, remote, config.head_height) {
            return Err(RejectReason::ForkDivergence);
        }
    }

    if parse_public_key(&theirs.pubkey).is_none() {
        return Err(RejectReason::InvalidPublicKey);
    }

    Ok(())
}

/// Check that `theirs` carries a signature of `challenge` made by the key it
/// advertises.
pub fn verify_challenge_response(theirs: &StatusMessage, challenge: &[u8; 32]) -> Result<(), RejectReason> {
    let public_key = parse_public_key(&theirs.pubkey).ok_or(RejectReason::InvalidPublicKey)?;
    let signature = theirs
        .signature
        .as_deref()
        .and_then(|sig| hex::decode(sig).ok())
        .ok_or(RejectReason::BadSignature)?;
    if !verify_challenge(&public_key, challenge, &signature) {
        return Err(RejectReason::BadSignature);
    }
    Ok(())
}

/// Check if two fork IDs are compatible (EIP-2124 logic).
///
/// 1. **Hash mismatch**: incompatible
/// 2. **No scheduled fork** on either side: compatible
/// 3. **Same next fork**: compatible
/// 4. **Their next fork already passed** for us: incompatible
pub fn is_fork_compatible(ours: &ForkId, theirs: &ForkId, our_height: u64) -> bool {
    if ours.hash != theirs.hash {
        return false;
    }
    if ours.next == 0 || theirs.next == 0 || ours.next == theirs.next {
        return true;
    }
    theirs.next > our_height
}

#[cfg(test)]
mod tests;
