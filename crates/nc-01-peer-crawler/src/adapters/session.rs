//! # TCP Status Session
//!
//! Dials the candidate's listening port, writes our status line and reads
//! theirs. The peer must verify, must sign our random challenge with the key
//! it advertises, and that key must hash to the candidate's node id.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shared_types::NodeId;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::domain::{
    verify_challenge_response, verify_status, Candidate, HandshakeConfig, LocalIdentity, ProbeError,
    ProbeOutcome, StatusMessage, MAX_STATUS_LINE,
};
use crate::ports::PeerSession;

/// [`PeerSession`] speaking the JSON status handshake over TCP.
pub struct TcpStatusSession {
    identity: Arc<LocalIdentity>,
    config: Arc<HandshakeConfig>,
    listen_port: Option<u16>,
}

impl TcpStatusSession {
    pub fn new(identity: Arc<LocalIdentity>, config: Arc<HandshakeConfig>, listen_port: Option<u16>) -> Self {
        Self {
            identity,
            config,
            listen_port,
        }
    }
}

/// Read one status line, refusing to buffer more than [`MAX_STATUS_LINE`].
pub(crate) async fn read_status<R>(reader: R) -> Result<StatusMessage, ProbeError>
where
    R: AsyncRead + Unpin,
{
    let mut limited = BufReader::new(reader.take(MAX_STATUS_LINE as u64 + 1));
    let mut line = String::new();
    let read = limited.read_line(&mut line).await.map_err(ProbeError::from_io)?;
    if read == 0 {
        return Err(ProbeError::Protocol("connection closed before status".into()));
    }
    StatusMessage::decode_line(&line)
}

#[async_trait]
impl PeerSession for TcpStatusSession {
    async fn dial(&self, candidate: &Candidate, timeout: Duration) -> Result<ProbeOutcome, ProbeError> {
        let addr = candidate.dial_addr();
        let mut stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ProbeError::Timeout(timeout))?
            .map_err(ProbeError::from_io)?;

        let challenge: [u8; 32] = rand::random();
        let ours = StatusMessage::local(&self.identity, &self.config, self.listen_port, &[])
            .with_challenge(&challenge);
        stream
            .write_all(ours.encode_line()?.as_bytes())
            .await
            .map_err(ProbeError::from_io)?;

        let (reader, _writer) = stream.split();
        let theirs = read_status(reader).await?;
        verify_status(&self.config, &theirs).map_err(ProbeError::Rejected)?;
        verify_challenge_response(&theirs, &challenge).map_err(ProbeError::Rejected)?;

        let outcome = theirs.into_outcome()?;
        let actual = NodeId::from_public_key(&outcome.public_key);
        if actual != candidate.node_id {
            return Err(ProbeError::IdentityMismatch {
                expected: candidate.node_id,
                actual,
            });
        }
        Ok(outcome)
    }
}
