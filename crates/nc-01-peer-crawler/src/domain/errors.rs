//! Crawler error taxonomy.
//!
//! [`CrawlerError`] is fatal at startup. [`ProbeError`] is scoped to one
//! probe and never leaves the worker that produced it.

use std::time::Duration;

use nc_02_peer_store::StoreError;
use shared_types::NodeId;
use thiserror::Error;

use super::handshake::RejectReason;

/// Startup failures. The crawler cannot run without an identity and a
/// bound listening socket.
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("invalid node key: {0}")]
    Identity(String),

    #[error("failed to bind listener on {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("invalid bootnode {entry}: {reason}")]
    Bootnode { entry: String, reason: String },
}

/// Why a single probe did not produce a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection refused")]
    Refused,

    #[error("peer unreachable: {0}")]
    Unreachable(String),

    #[error("handshake rejected: {0}")]
    Rejected(RejectReason),

    #[error("peer identity mismatch: expected {expected}, got {actual}")]
    IdentityMismatch { expected: NodeId, actual: NodeId },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("failed to persist record: {0}")]
    Store(StoreError),
}

impl ProbeError {
    /// Metric label for this failure class.
    pub fn label(&self) -> &'static str {
        match self {
            ProbeError::Timeout(_) => "timeout",
            ProbeError::Refused => "refused",
            ProbeError::Unreachable(_) => "unreachable",
            ProbeError::Rejected(_) => "rejected",
            ProbeError::IdentityMismatch { .. } => "identity_mismatch",
            ProbeError::Protocol(_) => "protocol",
            ProbeError::Store(_) => "store",
        }
    }

    pub(crate) fn from_io(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::ConnectionRefused => ProbeError::Refused,
            ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => {
                ProbeError::Protocol(format!("connection closed: {}", err))
            }
            _ => ProbeError::Unreachable(err.to_string()),
        }
    }
}
