//! Domain layer: identity, candidates, handshake rules and XOR distance.
//!
//! Nothing here performs I/O.

pub mod candidate;
pub mod distance;
pub mod errors;
pub mod handshake;
pub mod identity;
pub mod network;

pub use candidate::{Candidate, ProbeOutcome};
pub use distance::{bucket_index, sort_by_distance, xor_distance};
pub use errors::{CrawlerError, ProbeError};
pub use handshake::{
    is_fork_compatible, verify_challenge_response, verify_status, HandshakeConfig, NeighbourEntry,
    RejectReason, StatusMessage, MAX_NEIGHBOURS, MAX_STATUS_LINE,
};
pub use identity::{parse_public_key, verify_challenge, LocalIdentity};
pub use network::Network;
