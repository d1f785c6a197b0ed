//! # Status Listener
//!
//! Binds the crawler's listening address and answers inbound status
//! handshakes, so crawlers can probe each other. Every answer signs the
//! dialer's challenge. A verified inbound peer that advertises a listening
//! port is reported to the discovery source as a candidate; it has proven
//! nothing yet and is only recorded once probed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use shared_types::{NodeAddr, NodeId};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::session::read_status;
use crate::domain::{
    verify_status, Candidate, CrawlerError, HandshakeConfig, LocalIdentity, ProbeError, StatusMessage,
    MAX_NEIGHBOURS,
};
use crate::ports::DiscoverySource;

/// Inbound handshakes that take longer than this are dropped.
const INBOUND_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound TCP listener answering status handshakes.
pub struct Listener {
    listener: TcpListener,
    identity: Arc<LocalIdentity>,
    config: Arc<HandshakeConfig>,
    discovery: Arc<dyn DiscoverySource>,
}

impl Listener {
    /// Bind `addr`. Failure is fatal for the crawler.
    pub async fn bind(
        addr: &str,
        identity: Arc<LocalIdentity>,
        config: Arc<HandshakeConfig>,
        discovery: Arc<dyn DiscoverySource>,
    ) -> Result<Self, CrawlerError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| CrawlerError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            listener,
            identity,
            config,
            discovery,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, CrawlerError> {
        self.listener.local_addr().map_err(|e| CrawlerError::Bind {
            addr: "listener".to_string(),
            reason: e.to_string(),
        })
    }

    /// Accept connections until shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let listen_port = self.listener.local_addr().ok().map(|a| a.port());
        info!(addr = ?self.listener.local_addr().ok(), node_id = %self.identity.node_id(), "Listening for status handshakes");

        while !*shutdown.borrow() {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let handler = InboundHandler {
                            identity: Arc::clone(&self.identity),
                            config: Arc::clone(&self.config),
                            discovery: Arc::clone(&self.discovery),
                            listen_port,
                        };
                        tokio::spawn(async move {
                            match tokio::time::timeout(INBOUND_TIMEOUT, handler.handle(stream, remote)).await {
                                Ok(Ok(node_id)) => debug!(%remote, %node_id, "Answered status handshake"),
                                Ok(Err(e)) => debug!(%remote, err = %e, "Inbound handshake failed"),
                                Err(_) => debug!(%remote, "Inbound handshake timed out"),
                            }
                        });
                    }
                    Err(e) => warn!(err = %e, "Accept failed"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Listener stopped");
    }
}

struct InboundHandler {
    identity: Arc<LocalIdentity>,
    config: Arc<HandshakeConfig>,
    discovery: Arc<dyn DiscoverySource>,
    listen_port: Option<u16>,
}

impl InboundHandler {
    async fn handle(self, mut stream: TcpStream, remote: SocketAddr) -> Result<NodeId, ProbeError> {
        let (reader, mut writer) = stream.split();
        let theirs = read_status(reader).await?;
        verify_status(&self.config, &theirs).map_err(ProbeError::Rejected)?;

        let neighbours = self.discovery.known_peers(MAX_NEIGHBOURS).await;
        let ours = StatusMessage::local(&self.identity, &self.config, self.listen_port, &neighbours)
            .answer_challenge(&self.identity, &theirs)?;
        writer
            .write_all(ours.encode_line()?.as_bytes())
            .await
            .map_err(ProbeError::from_io)?;
        writer.flush().await.map_err(ProbeError::from_io)?;

        let outcome = theirs.into_outcome()?;
        let node_id = NodeId::from_public_key(&outcome.public_key);
        if let Some(port) = outcome.listen_port {
            let dialer = Candidate::new(node_id, NodeAddr::new(remote.ip(), port));
            self.discovery.report_neighbours(&node_id, vec![dialer]).await;
        }
        Ok(node_id)
    }
}
