//! Status handshake over real loopback sockets.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use nc_01_peer_crawler::{
    Candidate, CrawlerError, DiscoverySource, HandshakeConfig, Listener, LocalIdentity, LookupConfig,
    LookupSource, Network, PeerSession, ProbeError, RejectReason, StatusMessage, TcpStatusSession,
};
use shared_types::{NodeAddr, NodeId};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::watch;

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const TIMEOUT: Duration = Duration::from_secs(2);

fn mainnet() -> Arc<HandshakeConfig> {
    Arc::new(HandshakeConfig::for_network(
        Network::Mainnet.network_id(),
        Network::Mainnet.genesis_hash(),
    ))
}

fn sepolia() -> Arc<HandshakeConfig> {
    Arc::new(HandshakeConfig::for_network(
        Network::Sepolia.network_id(),
        Network::Sepolia.genesis_hash(),
    ))
}

struct RunningListener {
    identity: Arc<LocalIdentity>,
    discovery: Arc<LookupSource>,
    port: u16,
    shutdown: watch::Sender<bool>,
}

impl RunningListener {
    fn candidate(&self) -> Candidate {
        Candidate::new(self.identity.node_id(), NodeAddr::new(LOOPBACK, self.port))
    }
}

async fn start_listener(config: Arc<HandshakeConfig>, bootnodes: Vec<Candidate>) -> RunningListener {
    let identity = Arc::new(LocalIdentity::generate());
    let discovery = Arc::new(LookupSource::with_bootnodes(
        identity.node_id(),
        LookupConfig::default(),
        bootnodes,
    ));
    let listener = Listener::bind("127.0.0.1:0", identity.clone(), config, discovery.clone())
        .await
        .unwrap();
    let port = listener.local_addr().unwrap().port();
    let (shutdown, rx) = watch::channel(false);
    tokio::spawn(listener.run(rx));
    RunningListener {
        identity,
        discovery,
        port,
        shutdown,
    }
}

#[tokio::test]
async fn test_handshake_learns_identity_and_neighbours() {
    let far_peer = Candidate::new(
        NodeId::new([0x42; 32]),
        NodeAddr::new("10.9.9.9".parse().unwrap(), 30303),
    );
    let remote = start_listener(mainnet(), vec![far_peer.clone()]).await;
    let session = TcpStatusSession::new(Arc::new(LocalIdentity::generate()), mainnet(), None);

    let outcome = session.dial(&remote.candidate(), TIMEOUT).await.unwrap();

    assert_eq!(NodeId::from_public_key(&outcome.public_key), remote.identity.node_id());
    assert_eq!(outcome.metadata.network_id, 1);
    assert_eq!(outcome.listen_port, Some(remote.port));
    assert_eq!(outcome.neighbours, vec![far_peer]);

    remote.shutdown.send(true).unwrap();
}

#[tokio::test]
async fn test_listener_learns_dialer_with_listen_port() {
    let remote = start_listener(mainnet(), Vec::new()).await;
    let dialer = Arc::new(LocalIdentity::generate());
    let session = TcpStatusSession::new(dialer.clone(), mainnet(), Some(30999));

    session.dial(&remote.candidate(), TIMEOUT).await.unwrap();

    // The listener records the dialer after replying.
    tokio::time::timeout(TIMEOUT, async {
        loop {
            let known = remote.discovery.known_peers(16).await;
            if known.iter().any(|c| c.node_id == dialer.node_id()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("dialer never learned");
}

#[tokio::test]
async fn test_wrong_identity_is_mismatch() {
    let remote = start_listener(mainnet(), Vec::new()).await;
    let session = TcpStatusSession::new(Arc::new(LocalIdentity::generate()), mainnet(), None);
    let impostor = Candidate::new(NodeId::new([7; 32]), NodeAddr::new(LOOPBACK, remote.port));

    let err = session.dial(&impostor, TIMEOUT).await.unwrap_err();

    assert!(matches!(err, ProbeError::IdentityMismatch { actual, .. } if actual == remote.identity.node_id()));
}

#[tokio::test]
async fn test_listener_drops_other_network() {
    let remote = start_listener(sepolia(), Vec::new()).await;
    let session = TcpStatusSession::new(Arc::new(LocalIdentity::generate()), mainnet(), None);

    let err = session.dial(&remote.candidate(), TIMEOUT).await.unwrap_err();

    assert!(matches!(err, ProbeError::Protocol(_) | ProbeError::Refused | ProbeError::Unreachable(_)));
}

#[tokio::test]
async fn test_dialer_rejects_other_network() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = server.local_addr().unwrap().port();
    let identity = LocalIdentity::generate();
    let candidate = Candidate::new(identity.node_id(), NodeAddr::new(LOOPBACK, port));
    let line = StatusMessage::local(&identity, &sepolia(), Some(port), &[])
        .encode_line()
        .unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = server.accept().await.unwrap();
        stream.write_all(line.as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
    });

    let session = TcpStatusSession::new(Arc::new(LocalIdentity::generate()), mainnet(), None);
    let err = session.dial(&candidate, TIMEOUT).await.unwrap_err();

    assert_eq!(err, ProbeError::Rejected(RejectReason::NetworkIdMismatch));
}

/// Serve one connection: read the dialer's status, answer with `reply`.
async fn answer_once<F>(reply: F) -> u16
where
    F: FnOnce(StatusMessage) -> StatusMessage + Send + 'static,
{
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = server.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (stream, _) = server.accept().await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await.unwrap();
        let request = StatusMessage::decode_line(&line).unwrap();
        let answer = reply(request).encode_line().unwrap();
        writer.write_all(answer.as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
    });
    port
}

#[tokio::test]
async fn test_replayed_status_of_other_identity_is_rejected() {
    let victim = Arc::new(LocalIdentity::generate());
    // A status the victim really signed, for a challenge seen earlier.
    let mut recorded = StatusMessage::local(&victim, &mainnet(), None, &[]);
    recorded.signature = Some(hex::encode(victim.sign_challenge(&[0x11; 32])));

    let port = answer_once(move |_request| recorded).await;
    let candidate = Candidate::new(victim.node_id(), NodeAddr::new(LOOPBACK, port));
    let session = TcpStatusSession::new(Arc::new(LocalIdentity::generate()), mainnet(), None);

    let err = session.dial(&candidate, TIMEOUT).await.unwrap_err();

    assert_eq!(err, ProbeError::Rejected(RejectReason::BadSignature));
}

#[tokio::test]
async fn test_impostor_signing_with_own_key_is_rejected() {
    let victim = Arc::new(LocalIdentity::generate());
    let impostor = LocalIdentity::generate();
    let advertised = victim.clone();

    let port = answer_once(move |request| {
        StatusMessage::local(&advertised, &mainnet(), None, &[])
            .answer_challenge(&impostor, &request)
            .unwrap()
    })
    .await;
    let candidate = Candidate::new(victim.node_id(), NodeAddr::new(LOOPBACK, port));
    let session = TcpStatusSession::new(Arc::new(LocalIdentity::generate()), mainnet(), None);

    let err = session.dial(&candidate, TIMEOUT).await.unwrap_err();

    assert_eq!(err, ProbeError::Rejected(RejectReason::BadSignature));
}

#[tokio::test]
async fn test_unsigned_status_is_rejected() {
    let victim = Arc::new(LocalIdentity::generate());
    let advertised = victim.clone();

    let port = answer_once(move |_request| StatusMessage::local(&advertised, &mainnet(), None, &[])).await;
    let candidate = Candidate::new(victim.node_id(), NodeAddr::new(LOOPBACK, port));
    let session = TcpStatusSession::new(Arc::new(LocalIdentity::generate()), mainnet(), None);

    let err = session.dial(&candidate, TIMEOUT).await.unwrap_err();

    assert_eq!(err, ProbeError::Rejected(RejectReason::BadSignature));
}

#[tokio::test]
async fn test_listener_ignores_dialer_without_challenge() {
    let remote = start_listener(mainnet(), Vec::new()).await;
    let dialer = LocalIdentity::generate();
    let line = StatusMessage::local(&dialer, &mainnet(), Some(30999), &[])
        .encode_line()
        .unwrap();

    let mut stream = tokio::net::TcpStream::connect((LOOPBACK, remote.port)).await.unwrap();
    stream.write_all(line.as_bytes()).await.unwrap();
    let mut reply = String::new();
    let read = tokio::time::timeout(TIMEOUT, BufReader::new(&mut stream).read_line(&mut reply))
        .await
        .unwrap()
        .unwrap_or(0);

    assert_eq!(read, 0, "listener answered an unchallenged status: {}", reply);
    assert!(remote.discovery.known_peers(16).await.is_empty());
}

#[tokio::test]
async fn test_closed_port_fails_fast() {
    // Grab a free port, then release it.
    let port = {
        let spare = TcpListener::bind("127.0.0.1:0").await.unwrap();
        spare.local_addr().unwrap().port()
    };
    let candidate = Candidate::new(NodeId::new([1; 32]), NodeAddr::new(LOOPBACK, port));
    let session = TcpStatusSession::new(Arc::new(LocalIdentity::generate()), mainnet(), None);

    let err = session.dial(&candidate, TIMEOUT).await.unwrap_err();

    assert!(matches!(err, ProbeError::Refused | ProbeError::Unreachable(_)));
}

#[tokio::test]
async fn test_double_bind_is_fatal() {
    let identity = Arc::new(LocalIdentity::generate());
    let discovery = Arc::new(LookupSource::new(identity.node_id(), LookupConfig::default()));
    let first = Listener::bind("127.0.0.1:0", identity.clone(), mainnet(), discovery.clone())
        .await
        .unwrap();
    let addr = first.local_addr().unwrap().to_string();

    let second = Listener::bind(&addr, identity, mainnet(), discovery).await;

    assert!(matches!(second, Err(CrawlerError::Bind { .. })));
}
